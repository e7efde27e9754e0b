use anyhow::{Context, Result};
use pact_schemas::{
    BlueprintRequest, FieldSpecRequest, FieldValueUpdate, FieldValuesRequest, TransitionRequest,
};
use std::fs;

pub fn field_request(field_type: &str, label: &str, x: i64, y: i64) -> FieldSpecRequest {
    FieldSpecRequest {
        field_type: Some(field_type.to_string()),
        label: Some(label.to_string()),
        position_x: Some(x),
        position_y: Some(y),
    }
}

/// Two-field NDA: a text "Name" followed by a signature "Sig".
pub fn nda_request() -> BlueprintRequest {
    BlueprintRequest {
        name: Some("NDA".to_string()),
        fields: Some(vec![
            field_request("text", "Name", 10, 20),
            field_request("signature", "Sig", 10, 80),
        ]),
    }
}

pub fn transition_request(new_status: &str) -> TransitionRequest {
    TransitionRequest {
        new_status: Some(new_status.to_string()),
    }
}

pub fn values_request(values: &[(i64, Option<&str>)]) -> FieldValuesRequest {
    FieldValuesRequest {
        fields: Some(
            values
                .iter()
                .map(|(id, v)| FieldValueUpdate {
                    id: Some(*id),
                    value: v.map(str::to_string),
                })
                .collect(),
        ),
    }
}

pub fn load_blueprint_request_json(path: &str) -> Result<BlueprintRequest> {
    let s = fs::read_to_string(path).with_context(|| format!("read blueprint fixture: {path}"))?;
    let req: BlueprintRequest = serde_json::from_str(&s).context("parse blueprint fixture json")?;
    Ok(req)
}
