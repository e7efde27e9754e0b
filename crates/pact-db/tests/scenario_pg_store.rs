//! Postgres-backed store scenarios.
//!
//! DB-backed tests. Each one skips if PACT_DATABASE_URL is not set. Every
//! test creates its own blueprint, so tests can share one database.

use std::collections::BTreeMap;

use pact_db::{BlueprintDelete, ContractFilter, FieldWrite, PgStore, StatusWrite, Store};
use pact_schemas::{BlueprintPatch, ContractStatus, FieldSpec, FieldType, NewBlueprint};

async fn store_or_skip() -> anyhow::Result<Option<PgStore>> {
    let url = match std::env::var(pact_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: PACT_DATABASE_URL not set");
            return Ok(None);
        }
    };
    let pool = pact_db::connect(&url, 2).await?;
    pact_db::migrate(&pool).await?;
    Ok(Some(PgStore::new(pool)))
}

fn spec(field_type: FieldType, label: &str, x: i32, y: i32) -> FieldSpec {
    FieldSpec {
        field_type,
        label: label.to_string(),
        position_x: x,
        position_y: y,
    }
}

fn nda() -> NewBlueprint {
    NewBlueprint {
        name: "NDA".to_string(),
        fields: vec![
            spec(FieldType::Text, "Name", 10, 20),
            spec(FieldType::Signature, "Sig", 10, 400),
        ],
    }
}

#[tokio::test]
async fn migrate_is_idempotent() -> anyhow::Result<()> {
    let Some(store) = store_or_skip().await? else {
        return Ok(());
    };
    pact_db::migrate(store.pool()).await?;
    let st = pact_db::status(store.pool()).await?;
    assert!(st.ok);
    assert!(st.has_contracts_table);
    Ok(())
}

#[tokio::test]
async fn instantiate_copies_fields_in_order_with_null_values() -> anyhow::Result<()> {
    let Some(store) = store_or_skip().await? else {
        return Ok(());
    };

    let bp = store.insert_blueprint(&nda()).await?;
    assert_eq!(bp.fields.len(), 2);

    let c = store
        .instantiate_contract(bp.id, "Acme NDA")
        .await?
        .expect("blueprint exists");
    assert_eq!(c.status, ContractStatus::Created);
    assert_eq!(c.blueprint_id, bp.id);
    assert_eq!(c.blueprint_name, "NDA");
    assert_eq!(c.fields.len(), bp.fields.len());
    for (cf, bf) in c.fields.iter().zip(&bp.fields) {
        assert_eq!(cf.field_type, bf.field_type);
        assert_eq!(cf.label, bf.label);
        assert_eq!(cf.position_x, bf.position_x);
        assert_eq!(cf.position_y, bf.position_y);
        assert_eq!(cf.value, None);
    }

    assert!(store.instantiate_contract(i64::MAX, "ghost").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn status_writes_follow_the_policy() -> anyhow::Result<()> {
    let Some(store) = store_or_skip().await? else {
        return Ok(());
    };

    let bp = store.insert_blueprint(&nda()).await?;
    let c = store.instantiate_contract(bp.id, "x").await?.expect("created");

    match store.write_status(c.id, ContractStatus::Sent).await? {
        StatusWrite::Rejected(e) => {
            assert_eq!(e.current, ContractStatus::Created);
            assert_eq!(e.attempted, ContractStatus::Sent);
        }
        other => panic!("expected rejection, got {other:?}"),
    }

    match store.write_status(c.id, ContractStatus::Approved).await? {
        StatusWrite::Applied(c) => assert_eq!(c.status, ContractStatus::Approved),
        other => panic!("expected applied, got {other:?}"),
    }

    assert_eq!(
        store.write_status(i64::MAX, ContractStatus::Approved).await?,
        StatusWrite::Missing
    );
    Ok(())
}

#[tokio::test]
async fn foreign_field_id_rejects_whole_batch() -> anyhow::Result<()> {
    let Some(store) = store_or_skip().await? else {
        return Ok(());
    };

    let bp = store.insert_blueprint(&nda()).await?;
    let a = store.instantiate_contract(bp.id, "a").await?.expect("a");
    let b = store.instantiate_contract(bp.id, "b").await?.expect("b");

    let mut values = BTreeMap::new();
    values.insert(a.fields[0].id, Some("Alice".to_string()));
    values.insert(b.fields[0].id, Some("Mallory".to_string()));

    assert_eq!(
        store.write_field_values(a.id, &values).await?,
        FieldWrite::ForeignIds {
            requested: 2,
            owned: 1
        }
    );

    let a_after = store.fetch_contract(a.id).await?.expect("a");
    let b_after = store.fetch_contract(b.id).await?.expect("b");
    assert!(a_after.fields.iter().all(|f| f.value.is_none()));
    assert!(b_after.fields.iter().all(|f| f.value.is_none()));
    Ok(())
}

#[tokio::test]
async fn field_values_are_immutable_after_signature() -> anyhow::Result<()> {
    let Some(store) = store_or_skip().await? else {
        return Ok(());
    };

    let bp = store.insert_blueprint(&nda()).await?;
    let c = store.instantiate_contract(bp.id, "x").await?.expect("created");

    let mut values = BTreeMap::new();
    values.insert(c.fields[1].id, Some("signed-by-alice".to_string()));
    match store.write_field_values(c.id, &values).await? {
        FieldWrite::Applied(c) => {
            assert_eq!(c.fields[1].value.as_deref(), Some("signed-by-alice"));
            assert_eq!(c.fields[0].value, None);
        }
        other => panic!("expected applied, got {other:?}"),
    }

    for s in [
        ContractStatus::Approved,
        ContractStatus::Sent,
        ContractStatus::Signed,
    ] {
        assert!(matches!(
            store.write_status(c.id, s).await?,
            StatusWrite::Applied(_)
        ));
    }

    assert_eq!(
        store.write_field_values(c.id, &values).await?,
        FieldWrite::Immutable(ContractStatus::Signed)
    );
    Ok(())
}

#[tokio::test]
async fn blueprint_delete_is_protected_then_cascades() -> anyhow::Result<()> {
    let Some(store) = store_or_skip().await? else {
        return Ok(());
    };

    let bp = store.insert_blueprint(&nda()).await?;
    let c = store.instantiate_contract(bp.id, "x").await?.expect("created");

    assert_eq!(
        store.delete_blueprint(bp.id).await?,
        BlueprintDelete::InUse { contracts: 1 }
    );
    assert!(store.fetch_blueprint(bp.id).await?.is_some());

    assert!(store.delete_contract(c.id).await?);
    assert!(!store.delete_contract(c.id).await?);

    assert_eq!(store.delete_blueprint(bp.id).await?, BlueprintDelete::Deleted);
    assert!(store.fetch_blueprint(bp.id).await?.is_none());

    let (orphans,): (i64,) = sqlx::query_as(
        "select count(*)::bigint from blueprint_fields where blueprint_id = $1",
    )
    .bind(bp.id)
    .fetch_one(store.pool())
    .await?;
    assert_eq!(orphans, 0);

    assert_eq!(store.delete_blueprint(bp.id).await?, BlueprintDelete::Missing);
    Ok(())
}

#[tokio::test]
async fn replace_recreates_fields_and_leaves_contracts_alone() -> anyhow::Result<()> {
    let Some(store) = store_or_skip().await? else {
        return Ok(());
    };

    let bp = store.insert_blueprint(&nda()).await?;
    let c = store.instantiate_contract(bp.id, "x").await?.expect("created");

    let patch = BlueprintPatch {
        name: Some("NDA v2".to_string()),
        fields: Some(vec![spec(FieldType::Checkbox, "Agree", 0, 0)]),
    };
    let replaced = store
        .replace_blueprint(bp.id, &patch)
        .await?
        .expect("blueprint exists");
    assert_eq!(replaced.name, "NDA v2");
    assert_eq!(replaced.fields.len(), 1);
    assert!(replaced.fields.iter().all(|f| bp.fields.iter().all(|old| old.id != f.id)));

    // Rename only: fields untouched.
    let renamed = store
        .replace_blueprint(
            bp.id,
            &BlueprintPatch {
                name: Some("NDA v3".to_string()),
                fields: None,
            },
        )
        .await?
        .expect("blueprint exists");
    assert_eq!(renamed.fields, replaced.fields);

    // The contract kept its snapshot.
    let c_after = store.fetch_contract(c.id).await?.expect("contract");
    assert_eq!(c_after.fields.len(), 2);
    assert_eq!(c_after.blueprint_name, "NDA v3");

    assert!(store
        .replace_blueprint(i64::MAX, &BlueprintPatch::default())
        .await?
        .is_none());
    Ok(())
}

#[tokio::test]
async fn list_contracts_filters_by_status() -> anyhow::Result<()> {
    let Some(store) = store_or_skip().await? else {
        return Ok(());
    };

    let bp = store.insert_blueprint(&nda()).await?;
    let a = store.instantiate_contract(bp.id, "a").await?.expect("a");
    let b = store.instantiate_contract(bp.id, "b").await?.expect("b");
    store.write_status(b.id, ContractStatus::Revoked).await?;

    let revoked = store
        .list_contracts(&ContractFilter {
            statuses: vec![ContractStatus::Revoked],
        })
        .await?;
    assert!(revoked.iter().any(|c| c.id == b.id));
    assert!(revoked.iter().all(|c| c.id != a.id));
    assert!(revoked.iter().all(|c| c.status == ContractStatus::Revoked));

    let all = store.list_contracts(&ContractFilter::default()).await?;
    let pos_a = all.iter().position(|c| c.id == a.id).expect("a listed");
    let pos_b = all.iter().position(|c| c.id == b.id).expect("b listed");
    assert!(pos_b < pos_a, "newest first");
    assert_eq!(all[pos_a].fields.len(), 2);
    Ok(())
}
