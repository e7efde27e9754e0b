//! The in-memory store must agree with the Postgres store on every outcome
//! the service layer branches on.

use std::collections::BTreeMap;

use pact_db::{BlueprintDelete, ContractFilter, FieldWrite, StatusWrite, Store};
use pact_schemas::{BlueprintPatch, ContractStatus, FieldSpec, FieldType, NewBlueprint};
use pact_testkit::{load_blueprint_request_json, MemStore};

fn spec(t: FieldType, label: &str) -> FieldSpec {
    FieldSpec {
        field_type: t,
        label: label.to_string(),
        position_x: 0,
        position_y: 0,
    }
}

fn nda() -> NewBlueprint {
    NewBlueprint {
        name: "NDA".to_string(),
        fields: vec![spec(FieldType::Text, "Name"), spec(FieldType::Signature, "Sig")],
    }
}

#[tokio::test]
async fn instantiate_snapshots_fields_in_order_with_null_values() {
    let store = MemStore::new();
    let bp = store.insert_blueprint(&nda()).await.unwrap();

    let c = store
        .instantiate_contract(bp.id, "Acme NDA")
        .await
        .unwrap()
        .expect("blueprint exists");

    assert_eq!(c.status, ContractStatus::Created);
    assert_eq!(c.blueprint_name, "NDA");
    let labels: Vec<_> = c.fields.iter().map(|f| f.label.as_str()).collect();
    assert_eq!(labels, ["Name", "Sig"]);
    assert!(c.fields.iter().all(|f| f.value.is_none()));

    assert!(store.instantiate_contract(999, "ghost").await.unwrap().is_none());
    assert_eq!(store.contract_count().unwrap(), 1);
}

#[tokio::test]
async fn snapshot_is_independent_of_later_blueprint_edits() {
    let store = MemStore::new();
    let bp = store.insert_blueprint(&nda()).await.unwrap();
    let c = store.instantiate_contract(bp.id, "c").await.unwrap().unwrap();

    let patch = BlueprintPatch {
        name: Some("NDA v2".to_string()),
        fields: Some(vec![spec(FieldType::Date, "Effective")]),
    };
    let replaced = store.replace_blueprint(bp.id, &patch).await.unwrap().unwrap();
    assert_eq!(replaced.fields.len(), 1);
    assert!(replaced.fields[0].id > bp.fields[1].id);

    let again = store.fetch_contract(c.id).await.unwrap().unwrap();
    assert_eq!(again.fields, c.fields);
    assert_eq!(again.blueprint_name, "NDA v2");
}

#[tokio::test]
async fn status_writes_follow_policy() {
    let store = MemStore::new();
    let bp = store.insert_blueprint(&nda()).await.unwrap();
    let c = store.instantiate_contract(bp.id, "c").await.unwrap().unwrap();

    match store.write_status(c.id, ContractStatus::Sent).await.unwrap() {
        StatusWrite::Rejected(e) => {
            assert_eq!(e.current, ContractStatus::Created);
            assert_eq!(e.attempted, ContractStatus::Sent);
        }
        other => panic!("expected rejection, got {other:?}"),
    }

    let applied = store.write_status(c.id, ContractStatus::Approved).await.unwrap();
    assert!(matches!(applied, StatusWrite::Applied(ref c) if c.status == ContractStatus::Approved));
    assert_eq!(
        store.write_status(404, ContractStatus::Approved).await.unwrap(),
        StatusWrite::Missing
    );
}

#[tokio::test]
async fn foreign_field_id_changes_nothing() {
    let store = MemStore::new();
    let bp = store.insert_blueprint(&nda()).await.unwrap();
    let a = store.instantiate_contract(bp.id, "a").await.unwrap().unwrap();
    let b = store.instantiate_contract(bp.id, "b").await.unwrap().unwrap();

    let mut values = BTreeMap::new();
    values.insert(a.fields[0].id, Some("Alice".to_string()));
    values.insert(b.fields[0].id, Some("Mallory".to_string()));

    assert_eq!(
        store.write_field_values(a.id, &values).await.unwrap(),
        FieldWrite::ForeignIds {
            requested: 2,
            owned: 1
        }
    );
    let a_now = store.fetch_contract(a.id).await.unwrap().unwrap();
    assert!(a_now.fields.iter().all(|f| f.value.is_none()));
}

#[tokio::test]
async fn field_values_freeze_once_signed() {
    let store = MemStore::new();
    let bp = store.insert_blueprint(&nda()).await.unwrap();
    let c = store.instantiate_contract(bp.id, "c").await.unwrap().unwrap();
    for s in [ContractStatus::Approved, ContractStatus::Sent, ContractStatus::Signed] {
        store.write_status(c.id, s).await.unwrap();
    }

    let mut values = BTreeMap::new();
    values.insert(c.fields[1].id, Some("forged".to_string()));
    assert_eq!(
        store.write_field_values(c.id, &values).await.unwrap(),
        FieldWrite::Immutable(ContractStatus::Signed)
    );
}

#[tokio::test]
async fn blueprint_delete_is_blocked_while_referenced() {
    let store = MemStore::new();
    let bp = store.insert_blueprint(&nda()).await.unwrap();
    let c = store.instantiate_contract(bp.id, "c").await.unwrap().unwrap();

    assert_eq!(
        store.delete_blueprint(bp.id).await.unwrap(),
        BlueprintDelete::InUse { contracts: 1 }
    );
    assert!(store.delete_contract(c.id).await.unwrap());
    assert!(!store.delete_contract(c.id).await.unwrap());
    assert_eq!(store.delete_blueprint(bp.id).await.unwrap(), BlueprintDelete::Deleted);
    assert_eq!(store.delete_blueprint(bp.id).await.unwrap(), BlueprintDelete::Missing);
    assert_eq!(store.blueprint_count().unwrap(), 0);
}

#[tokio::test]
async fn lists_are_newest_first_and_filterable() {
    let store = MemStore::new();
    let bp = store.insert_blueprint(&nda()).await.unwrap();
    let first = store.instantiate_contract(bp.id, "first").await.unwrap().unwrap();
    let second = store.instantiate_contract(bp.id, "second").await.unwrap().unwrap();
    store.write_status(first.id, ContractStatus::Revoked).await.unwrap();

    let all = store.list_contracts(&ContractFilter::default()).await.unwrap();
    let ids: Vec<_> = all.iter().map(|c| c.id).collect();
    assert_eq!(ids, [second.id, first.id]);

    let revoked = store
        .list_contracts(&ContractFilter {
            statuses: vec![ContractStatus::Revoked],
        })
        .await
        .unwrap();
    assert_eq!(revoked.len(), 1);
    assert_eq!(revoked[0].id, first.id);
}

#[test]
fn employment_fixture_parses() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/employment_blueprint.json");
    let req = load_blueprint_request_json(path).unwrap();
    assert_eq!(req.name.as_deref(), Some("Employment Agreement"));
    assert_eq!(req.fields.map(|f| f.len()), Some(5));
}
