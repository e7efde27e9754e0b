//! Shared domain and wire types for pact.
//!
//! Everything here is plain data: `Serialize + Deserialize` structs and the
//! two closed enumerations (`FieldType`, `ContractStatus`). Lifecycle rules
//! live in `pact-lifecycle`; persistence lives in `pact-db`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// FieldType
// ---------------------------------------------------------------------------

/// Kind of a positioned field on a blueprint or contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Date,
    Signature,
    Checkbox,
}

impl FieldType {
    pub const ALL: [FieldType; 4] = [
        FieldType::Text,
        FieldType::Date,
        FieldType::Signature,
        FieldType::Checkbox,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Date => "date",
            FieldType::Signature => "signature",
            FieldType::Checkbox => "checkbox",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(FieldType::Text),
            "date" => Some(FieldType::Date),
            "signature" => Some(FieldType::Signature),
            "checkbox" => Some(FieldType::Checkbox),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ContractStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a contract. `Created` is the only initial value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContractStatus {
    Created,
    Approved,
    Sent,
    Signed,
    Locked,
    Revoked,
}

impl ContractStatus {
    pub const ALL: [ContractStatus; 6] = [
        ContractStatus::Created,
        ContractStatus::Approved,
        ContractStatus::Sent,
        ContractStatus::Signed,
        ContractStatus::Locked,
        ContractStatus::Revoked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Created => "CREATED",
            ContractStatus::Approved => "APPROVED",
            ContractStatus::Sent => "SENT",
            ContractStatus::Signed => "SIGNED",
            ContractStatus::Locked => "LOCKED",
            ContractStatus::Revoked => "REVOKED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATED" => Some(ContractStatus::Created),
            "APPROVED" => Some(ContractStatus::Approved),
            "SENT" => Some(ContractStatus::Sent),
            "SIGNED" => Some(ContractStatus::Signed),
            "LOCKED" => Some(ContractStatus::Locked),
            "REVOKED" => Some(ContractStatus::Revoked),
            _ => None,
        }
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Blueprints
// ---------------------------------------------------------------------------

/// A field definition owned by exactly one blueprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlueprintField {
    pub id: i64,
    pub field_type: FieldType,
    pub label: String,
    pub position_x: i32,
    pub position_y: i32,
}

/// A blueprint with its field definitions in submission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blueprint {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub fields: Vec<BlueprintField>,
}

/// A validated field definition, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub field_type: FieldType,
    pub label: String,
    pub position_x: i32,
    pub position_y: i32,
}

/// A validated blueprint, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBlueprint {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

/// A validated blueprint replacement. `None` leaves that part untouched;
/// `Some(fields)` replaces the whole field list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlueprintPatch {
    pub name: Option<String>,
    pub fields: Option<Vec<FieldSpec>>,
}

// ---------------------------------------------------------------------------
// Contracts
// ---------------------------------------------------------------------------

/// A contract's snapshot copy of a blueprint field. Only `value` ever changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractField {
    pub id: i64,
    pub field_type: FieldType,
    pub label: String,
    pub position_x: i32,
    pub position_y: i32,
    pub value: Option<String>,
}

/// A contract row joined with its blueprint name and its fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub id: i64,
    pub name: String,
    pub blueprint_id: i64,
    pub blueprint_name: String,
    pub status: ContractStatus,
    pub created_at: DateTime<Utc>,
    pub fields: Vec<ContractField>,
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------
//
// Every key is optional at the decode layer so that a missing key can be
// reported as a malformed request and an out-of-domain value as a validation
// error, instead of both collapsing into one decode failure.

/// Body of blueprint create / replace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlueprintRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: Option<Vec<FieldSpecRequest>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldSpecRequest {
    #[serde(default)]
    pub field_type: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub position_x: Option<i64>,
    #[serde(default)]
    pub position_y: Option<i64>,
}

/// Body of contract create: name plus the blueprint to instantiate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractCreateRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub blueprint_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransitionRequest {
    #[serde(default)]
    pub new_status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldValuesRequest {
    #[serde(default)]
    pub fields: Option<Vec<FieldValueUpdate>>,
}

/// One `{id, value}` assignment. A missing `value` clears the field.
/// `id` may arrive as a number or a numeric string (`"7"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValueUpdate {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<i64>,
    #[serde(default)]
    pub value: Option<String>,
}

fn lenient_id<'de, D>(de: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Num(i64),
        Text(String),
    }

    match Option::<RawId>::deserialize(de)? {
        None => Ok(None),
        Some(RawId::Num(n)) => Ok(Some(n)),
        Some(RawId::Text(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid field id \"{s}\""))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_names_round_trip_through_parse() {
        for s in ContractStatus::ALL {
            assert_eq!(ContractStatus::parse(s.as_str()), Some(s));
            let json = serde_json::to_string(&s).unwrap();
            assert_eq!(json, format!("\"{}\"", s.as_str()));
        }
        assert_eq!(ContractStatus::parse("created"), None);
        assert_eq!(ContractStatus::parse("ARCHIVED"), None);
    }

    #[test]
    fn field_type_uses_lowercase_wire_names() {
        for t in FieldType::ALL {
            assert_eq!(FieldType::parse(t.as_str()), Some(t));
        }
        assert_eq!(
            serde_json::to_string(&FieldType::Signature).unwrap(),
            "\"signature\""
        );
        assert_eq!(FieldType::parse("Signature"), None);
        assert_eq!(FieldType::parse("image"), None);
    }

    #[test]
    fn field_value_update_tolerates_missing_keys() {
        let u: FieldValueUpdate = serde_json::from_str(r#"{"value":"x"}"#).unwrap();
        assert_eq!(u.id, None);
        assert_eq!(u.value.as_deref(), Some("x"));

        let u: FieldValueUpdate = serde_json::from_str(r#"{"id":7}"#).unwrap();
        assert_eq!(u.id, Some(7));
        assert_eq!(u.value, None);
    }

    #[test]
    fn field_value_update_accepts_numeric_string_ids() {
        let u: FieldValueUpdate = serde_json::from_str(r#"{"id":"12","value":"x"}"#).unwrap();
        assert_eq!(u.id, Some(12));

        let u: FieldValueUpdate = serde_json::from_str(r#"{"id":null}"#).unwrap();
        assert_eq!(u.id, None);

        assert!(serde_json::from_str::<FieldValueUpdate>(r#"{"id":"twelve"}"#).is_err());
        assert!(serde_json::from_str::<FieldValueUpdate>(r#"{"id":1.5}"#).is_err());
    }
}
