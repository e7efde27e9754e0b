//! Request-body validation.
//!
//! Everything is checked before any row is written: one bad field definition
//! rejects the whole batch. Missing keys are `MalformedRequest`; present but
//! out-of-domain values are `ValidationError`.

use std::collections::BTreeMap;

use pact_schemas::{
    BlueprintPatch, BlueprintRequest, ContractStatus, FieldSpec, FieldSpecRequest, FieldType,
    FieldValueUpdate, NewBlueprint,
};

use crate::error::ServiceError;

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_LABEL_LEN: usize = 100;

pub(crate) fn new_blueprint(req: BlueprintRequest) -> Result<NewBlueprint, ServiceError> {
    let name = req
        .name
        .ok_or_else(|| ServiceError::malformed("'name' is required."))?;
    let fields = req
        .fields
        .ok_or_else(|| ServiceError::malformed("'fields' is required."))?;

    Ok(NewBlueprint {
        name: text("name", name, MAX_NAME_LEN)?,
        fields: field_specs(fields)?,
    })
}

/// `require_all` is true for a full replace, where both keys are mandatory.
pub(crate) fn blueprint_patch(
    req: BlueprintRequest,
    require_all: bool,
) -> Result<BlueprintPatch, ServiceError> {
    if require_all {
        let full = new_blueprint(req)?;
        return Ok(BlueprintPatch {
            name: Some(full.name),
            fields: Some(full.fields),
        });
    }

    Ok(BlueprintPatch {
        name: req
            .name
            .map(|n| text("name", n, MAX_NAME_LEN))
            .transpose()?,
        fields: req.fields.map(field_specs).transpose()?,
    })
}

fn field_specs(fields: Vec<FieldSpecRequest>) -> Result<Vec<FieldSpec>, ServiceError> {
    fields
        .into_iter()
        .enumerate()
        .map(|(i, f)| field_spec(i, f))
        .collect()
}

fn field_spec(i: usize, f: FieldSpecRequest) -> Result<FieldSpec, ServiceError> {
    let key = |k: &str| format!("fields[{i}].{k}");

    let raw_type = f
        .field_type
        .ok_or_else(|| ServiceError::malformed(format!("'{}' is required.", key("field_type"))))?;
    let field_type = FieldType::parse(&raw_type).ok_or_else(|| {
        ServiceError::invalid(format!(
            "{}: \"{raw_type}\" is not a valid choice.",
            key("field_type")
        ))
    })?;

    let label = f
        .label
        .ok_or_else(|| ServiceError::malformed(format!("'{}' is required.", key("label"))))?;

    Ok(FieldSpec {
        field_type,
        label: text(&key("label"), label, MAX_LABEL_LEN)?,
        position_x: position(&key("position_x"), f.position_x)?,
        position_y: position(&key("position_y"), f.position_y)?,
    })
}

fn position(key: &str, raw: Option<i64>) -> Result<i32, ServiceError> {
    let v = raw.ok_or_else(|| ServiceError::malformed(format!("'{key}' is required.")))?;
    i32::try_from(v).map_err(|_| ServiceError::invalid(format!("{key}: {v} is out of range.")))
}

/// Surrounding whitespace is dropped first; the rest must be non-blank and
/// at most `max` characters.
fn text(key: &str, value: String, max: usize) -> Result<String, ServiceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::invalid(format!("{key}: may not be blank.")));
    }
    if value.chars().count() > max {
        return Err(ServiceError::invalid(format!(
            "{key}: ensure this field has no more than {max} characters."
        )));
    }
    Ok(value.to_string())
}

pub(crate) fn contract_name(name: Option<String>) -> Result<String, ServiceError> {
    let name = name.ok_or_else(|| ServiceError::malformed("'name' is required."))?;
    text("name", name, MAX_NAME_LEN)
}

pub(crate) fn status(raw: Option<String>) -> Result<ContractStatus, ServiceError> {
    let raw = raw.ok_or_else(|| ServiceError::malformed("'new_status' is required."))?;
    ContractStatus::parse(&raw).ok_or_else(|| {
        ServiceError::invalid(format!("new_status: \"{raw}\" is not a valid choice."))
    })
}

/// Collapse `{id, value}` updates into one assignment per distinct id; a
/// repeated id keeps its last value.
pub(crate) fn field_values(
    updates: Option<Vec<FieldValueUpdate>>,
) -> Result<BTreeMap<i64, Option<String>>, ServiceError> {
    let updates = updates.ok_or_else(|| ServiceError::malformed("'fields' is required."))?;
    if updates.is_empty() {
        return Err(ServiceError::malformed("'fields' may not be empty."));
    }

    let mut out = BTreeMap::new();
    for u in updates {
        let id = u
            .id
            .ok_or_else(|| ServiceError::malformed("Each field update must include 'id'."))?;
        out.insert(id, u.value);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(t: &str, label: &str) -> FieldSpecRequest {
        FieldSpecRequest {
            field_type: Some(t.to_string()),
            label: Some(label.to_string()),
            position_x: Some(0),
            position_y: Some(0),
        }
    }

    fn req(name: Option<&str>, fields: Option<Vec<FieldSpecRequest>>) -> BlueprintRequest {
        BlueprintRequest {
            name: name.map(str::to_string),
            fields,
        }
    }

    #[test]
    fn unknown_field_type_rejects_batch() {
        let err = new_blueprint(req(
            Some("NDA"),
            Some(vec![field("text", "Name"), field("image", "Logo")]),
        ))
        .unwrap_err();
        match err {
            ServiceError::ValidationError(msg) => {
                assert!(msg.contains("fields[1].field_type"), "{msg}");
                assert!(msg.contains("image"), "{msg}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_keys_are_malformed() {
        assert!(matches!(
            new_blueprint(req(None, Some(vec![]))),
            Err(ServiceError::MalformedRequest(_))
        ));
        assert!(matches!(
            new_blueprint(req(Some("NDA"), None)),
            Err(ServiceError::MalformedRequest(_))
        ));

        let mut f = field("text", "Name");
        f.position_y = None;
        assert!(matches!(
            new_blueprint(req(Some("NDA"), Some(vec![f]))),
            Err(ServiceError::MalformedRequest(_))
        ));
    }

    #[test]
    fn names_and_labels_are_bounded() {
        let long = "x".repeat(MAX_NAME_LEN + 1);
        assert!(matches!(
            new_blueprint(req(Some(&long), Some(vec![]))),
            Err(ServiceError::ValidationError(_))
        ));
        assert!(matches!(
            new_blueprint(req(Some("   "), Some(vec![]))),
            Err(ServiceError::ValidationError(_))
        ));
        assert!(matches!(
            new_blueprint(req(Some("NDA"), Some(vec![field("text", "")]))),
            Err(ServiceError::ValidationError(_))
        ));
        let exact = "y".repeat(MAX_NAME_LEN);
        assert!(new_blueprint(req(Some(&exact), Some(vec![]))).is_ok());
    }

    #[test]
    fn names_and_labels_are_stored_trimmed() {
        let bp = new_blueprint(req(Some("  NDA  "), Some(vec![field("text", "\tName ")]))).unwrap();
        assert_eq!(bp.name, "NDA");
        assert_eq!(bp.fields[0].label, "Name");
        assert_eq!(contract_name(Some(" Acme ".into())).unwrap(), "Acme");
    }

    #[test]
    fn length_bound_counts_after_trimming() {
        let padded = format!("  {}  ", "z".repeat(MAX_NAME_LEN));
        let bp = new_blueprint(req(Some(&padded), Some(vec![]))).unwrap();
        assert_eq!(bp.name.len(), MAX_NAME_LEN);

        let over = format!(" {} ", "z".repeat(MAX_NAME_LEN + 1));
        assert!(matches!(
            contract_name(Some(over)),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn positions_must_fit_i32() {
        let mut f = field("date", "When");
        f.position_x = Some(i64::from(i32::MAX) + 1);
        assert!(matches!(
            new_blueprint(req(Some("NDA"), Some(vec![f]))),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn partial_patch_keeps_absent_parts() {
        let p = blueprint_patch(req(Some("Renamed"), None), false).unwrap();
        assert_eq!(p.name.as_deref(), Some("Renamed"));
        assert!(p.fields.is_none());

        assert!(matches!(
            blueprint_patch(req(Some("Renamed"), None), true),
            Err(ServiceError::MalformedRequest(_))
        ));
    }

    #[test]
    fn duplicate_ids_keep_last_value() {
        let values = field_values(Some(vec![
            FieldValueUpdate {
                id: Some(3),
                value: Some("first".into()),
            },
            FieldValueUpdate {
                id: Some(4),
                value: None,
            },
            FieldValueUpdate {
                id: Some(3),
                value: Some("last".into()),
            },
        ]))
        .unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[&3].as_deref(), Some("last"));
        assert_eq!(values[&4], None);
    }

    #[test]
    fn empty_or_idless_updates_are_malformed() {
        assert!(matches!(
            field_values(Some(vec![])),
            Err(ServiceError::MalformedRequest(_))
        ));
        assert!(matches!(
            field_values(None),
            Err(ServiceError::MalformedRequest(_))
        ));
        assert!(matches!(
            field_values(Some(vec![FieldValueUpdate {
                id: None,
                value: Some("x".into())
            }])),
            Err(ServiceError::MalformedRequest(_))
        ));
    }

    #[test]
    fn status_parsing_distinguishes_missing_from_unknown() {
        assert_eq!(status(Some("SENT".into())).unwrap(), ContractStatus::Sent);
        assert!(matches!(status(None), Err(ServiceError::MalformedRequest(_))));
        assert!(matches!(
            status(Some("sent".into())),
            Err(ServiceError::ValidationError(_))
        ));
    }
}
