//! Postgres-backed [`Store`].

use std::collections::{BTreeMap, HashMap};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pact_lifecycle::{can_edit_fields, check_transition};
use pact_schemas::{
    Blueprint, BlueprintField, BlueprintPatch, Contract, ContractField, ContractStatus, FieldSpec,
    FieldType, NewBlueprint,
};
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{PgPool, Row};

use crate::store::{BlueprintDelete, ContractFilter, FieldWrite, StatusWrite, Store};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_blueprint(&self, bp: &NewBlueprint) -> Result<Blueprint> {
        let mut tx = self.pool.begin().await.context("insert_blueprint begin failed")?;

        let (id,): (i64,) =
            sqlx::query_as::<_, (i64,)>("insert into blueprints (name) values ($1) returning id")
                .bind(&bp.name)
                .fetch_one(&mut *tx)
                .await
                .context("insert_blueprint failed")?;

        insert_blueprint_fields(&mut tx, id, &bp.fields).await?;

        let out = load_blueprint(&mut tx, id)
            .await?
            .ok_or_else(|| anyhow!("inserted blueprint {id} vanished"))?;
        tx.commit().await.context("insert_blueprint commit failed")?;
        Ok(out)
    }

    async fn replace_blueprint(&self, id: i64, patch: &BlueprintPatch) -> Result<Option<Blueprint>> {
        let mut tx = self.pool.begin().await.context("replace_blueprint begin failed")?;

        let res = sqlx::query("update blueprints set name = coalesce($2, name) where id = $1")
            .bind(id)
            .bind(patch.name.as_deref())
            .execute(&mut *tx)
            .await
            .context("replace_blueprint update failed")?;
        if res.rows_affected() == 0 {
            return Ok(None);
        }

        if let Some(fields) = &patch.fields {
            sqlx::query("delete from blueprint_fields where blueprint_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .context("replace_blueprint field delete failed")?;
            insert_blueprint_fields(&mut tx, id, fields).await?;
        }

        let out = load_blueprint(&mut tx, id).await?;
        tx.commit().await.context("replace_blueprint commit failed")?;
        Ok(out)
    }

    async fn fetch_blueprint(&self, id: i64) -> Result<Option<Blueprint>> {
        let mut conn = self.pool.acquire().await.context("acquire failed")?;
        load_blueprint(&mut conn, id).await
    }

    async fn list_blueprints(&self) -> Result<Vec<Blueprint>> {
        let rows = sqlx::query(
            r#"
            select id, name, created_at
            from blueprints
            order by created_at desc, id desc
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("list_blueprints failed")?;

        let ids: Vec<i64> = rows
            .iter()
            .map(|r| r.try_get::<i64, _>("id"))
            .collect::<Result<_, _>>()?;

        let field_rows = sqlx::query(
            r#"
            select id, blueprint_id, field_type, label, position_x, position_y
            from blueprint_fields
            where blueprint_id = any($1)
            order by blueprint_id, id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .context("list_blueprints fields failed")?;

        let mut by_parent: HashMap<i64, Vec<BlueprintField>> = HashMap::new();
        for r in &field_rows {
            by_parent
                .entry(r.try_get("blueprint_id")?)
                .or_default()
                .push(blueprint_field_from_row(r)?);
        }

        rows.iter()
            .map(|r| -> Result<Blueprint> {
                let id: i64 = r.try_get("id")?;
                Ok(Blueprint {
                    id,
                    name: r.try_get("name")?,
                    created_at: r.try_get::<DateTime<Utc>, _>("created_at")?,
                    fields: by_parent.remove(&id).unwrap_or_default(),
                })
            })
            .collect()
    }

    async fn delete_blueprint(&self, id: i64) -> Result<BlueprintDelete> {
        let mut tx = self.pool.begin().await.context("delete_blueprint begin failed")?;

        // Conflicts with the share lock taken by instantiate_contract, so the
        // reference count below cannot go stale before the delete.
        let exists = sqlx::query("select id from blueprints where id = $1 for update")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .context("delete_blueprint lock failed")?;
        if exists.is_none() {
            return Ok(BlueprintDelete::Missing);
        }

        let (contracts,): (i64,) = sqlx::query_as::<_, (i64,)>(
            "select count(*)::bigint from contracts where blueprint_id = $1",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .context("delete_blueprint reference count failed")?;
        if contracts > 0 {
            return Ok(BlueprintDelete::InUse { contracts });
        }

        sqlx::query("delete from blueprints where id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("delete_blueprint failed")?;
        tx.commit().await.context("delete_blueprint commit failed")?;
        Ok(BlueprintDelete::Deleted)
    }

    async fn instantiate_contract(&self, blueprint_id: i64, name: &str) -> Result<Option<Contract>> {
        let mut tx = self.pool.begin().await.context("instantiate begin failed")?;

        // Hold the blueprint steady (no rename, field replace or delete)
        // while its fields are copied.
        let locked = sqlx::query("select id from blueprints where id = $1 for share")
            .bind(blueprint_id)
            .fetch_optional(&mut *tx)
            .await
            .context("instantiate blueprint lock failed")?;
        if locked.is_none() {
            return Ok(None);
        }

        let Some(bp) = load_blueprint(&mut tx, blueprint_id).await? else {
            return Ok(None);
        };

        let inserted = sqlx::query_as::<_, (i64,)>(
            "insert into contracts (name, blueprint_id, status) values ($1, $2, $3) returning id",
        )
        .bind(name)
        .bind(blueprint_id)
        .bind(ContractStatus::Created.as_str())
        .fetch_one(&mut *tx)
        .await;

        let contract_id = match inserted {
            Ok((id,)) => id,
            // Blueprint deleted between our read and the insert.
            Err(e) if is_foreign_key_violation(&e) => return Ok(None),
            Err(e) => return Err(anyhow::Error::new(e).context("insert contract failed")),
        };

        for f in &bp.fields {
            sqlx::query(
                r#"
                insert into contract_fields (
                  contract_id, field_type, label, position_x, position_y, value
                ) values (
                  $1, $2, $3, $4, $5, null
                )
                "#,
            )
            .bind(contract_id)
            .bind(f.field_type.as_str())
            .bind(&f.label)
            .bind(f.position_x)
            .bind(f.position_y)
            .execute(&mut *tx)
            .await
            .context("insert contract field failed")?;
        }

        let out = load_contract(&mut tx, contract_id)
            .await?
            .ok_or_else(|| anyhow!("inserted contract {contract_id} vanished"))?;
        tx.commit().await.context("instantiate commit failed")?;
        Ok(Some(out))
    }

    async fn fetch_contract(&self, id: i64) -> Result<Option<Contract>> {
        let mut conn = self.pool.acquire().await.context("acquire failed")?;
        load_contract(&mut conn, id).await
    }

    async fn list_contracts(&self, filter: &ContractFilter) -> Result<Vec<Contract>> {
        let statuses: Vec<String> = filter
            .statuses
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();

        let rows = sqlx::query(
            r#"
            select c.id, c.name, c.blueprint_id, b.name as blueprint_name, c.status, c.created_at
            from contracts c
            join blueprints b on b.id = c.blueprint_id
            where cardinality($1::varchar[]) = 0 or c.status = any($1)
            order by c.created_at desc, c.id desc
            "#,
        )
        .bind(&statuses)
        .fetch_all(&self.pool)
        .await
        .context("list_contracts failed")?;

        let ids: Vec<i64> = rows
            .iter()
            .map(|r| r.try_get::<i64, _>("id"))
            .collect::<Result<_, _>>()?;

        let field_rows = sqlx::query(
            r#"
            select id, contract_id, field_type, label, position_x, position_y, value
            from contract_fields
            where contract_id = any($1)
            order by contract_id, id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .context("list_contracts fields failed")?;

        let mut by_parent: HashMap<i64, Vec<ContractField>> = HashMap::new();
        for r in &field_rows {
            by_parent
                .entry(r.try_get("contract_id")?)
                .or_default()
                .push(contract_field_from_row(r)?);
        }

        rows.iter()
            .map(|r| -> Result<Contract> {
                let mut c = contract_from_row(r)?;
                c.fields = by_parent.remove(&c.id).unwrap_or_default();
                Ok(c)
            })
            .collect()
    }

    async fn delete_contract(&self, id: i64) -> Result<bool> {
        let res = sqlx::query("delete from contracts where id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("delete_contract failed")?;
        Ok(res.rows_affected() > 0)
    }

    async fn write_status(&self, id: i64, target: ContractStatus) -> Result<StatusWrite> {
        let mut tx = self.pool.begin().await.context("write_status begin failed")?;

        let Some(current) = lock_contract_status(&mut tx, id).await? else {
            return Ok(StatusWrite::Missing);
        };
        if let Err(e) = check_transition(current, target) {
            return Ok(StatusWrite::Rejected(e));
        }

        sqlx::query("update contracts set status = $2 where id = $1")
            .bind(id)
            .bind(target.as_str())
            .execute(&mut *tx)
            .await
            .context("write_status update failed")?;

        let out = load_contract(&mut tx, id)
            .await?
            .ok_or_else(|| anyhow!("contract {id} vanished during write_status"))?;
        tx.commit().await.context("write_status commit failed")?;
        Ok(StatusWrite::Applied(out))
    }

    async fn write_field_values(
        &self,
        id: i64,
        values: &BTreeMap<i64, Option<String>>,
    ) -> Result<FieldWrite> {
        let mut tx = self.pool.begin().await.context("write_field_values begin failed")?;

        let Some(status) = lock_contract_status(&mut tx, id).await? else {
            return Ok(FieldWrite::Missing);
        };
        if !can_edit_fields(status) {
            return Ok(FieldWrite::Immutable(status));
        }

        let ids: Vec<i64> = values.keys().copied().collect();
        let (owned,): (i64,) = sqlx::query_as::<_, (i64,)>(
            "select count(*)::bigint from contract_fields where contract_id = $1 and id = any($2)",
        )
        .bind(id)
        .bind(&ids)
        .fetch_one(&mut *tx)
        .await
        .context("write_field_values ownership check failed")?;

        let owned = usize::try_from(owned).unwrap_or(0);
        if owned != ids.len() {
            return Ok(FieldWrite::ForeignIds {
                requested: ids.len(),
                owned,
            });
        }

        for (field_id, value) in values {
            sqlx::query("update contract_fields set value = $3 where id = $1 and contract_id = $2")
                .bind(field_id)
                .bind(id)
                .bind(value.as_deref())
                .execute(&mut *tx)
                .await
                .context("write_field_values update failed")?;
        }

        let out = load_contract(&mut tx, id)
            .await?
            .ok_or_else(|| anyhow!("contract {id} vanished during write_field_values"))?;
        tx.commit().await.context("write_field_values commit failed")?;
        Ok(FieldWrite::Applied(out))
    }
}

// ---------------------------------------------------------------------------
// Connection-level helpers (usable on a pooled connection or a transaction)
// ---------------------------------------------------------------------------

async fn insert_blueprint_fields(
    conn: &mut PgConnection,
    blueprint_id: i64,
    fields: &[FieldSpec],
) -> Result<()> {
    for f in fields {
        sqlx::query(
            r#"
            insert into blueprint_fields (
              blueprint_id, field_type, label, position_x, position_y
            ) values (
              $1, $2, $3, $4, $5
            )
            "#,
        )
        .bind(blueprint_id)
        .bind(f.field_type.as_str())
        .bind(&f.label)
        .bind(f.position_x)
        .bind(f.position_y)
        .execute(&mut *conn)
        .await
        .context("insert blueprint field failed")?;
    }
    Ok(())
}

async fn load_blueprint(conn: &mut PgConnection, id: i64) -> Result<Option<Blueprint>> {
    let Some(row) = sqlx::query("select id, name, created_at from blueprints where id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context("load_blueprint failed")?
    else {
        return Ok(None);
    };

    let fields = sqlx::query(
        r#"
        select id, field_type, label, position_x, position_y
        from blueprint_fields
        where blueprint_id = $1
        order by id
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await
    .context("load_blueprint fields failed")?
    .iter()
    .map(blueprint_field_from_row)
    .collect::<Result<Vec<_>>>()?;

    Ok(Some(Blueprint {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
        fields,
    }))
}

async fn load_contract(conn: &mut PgConnection, id: i64) -> Result<Option<Contract>> {
    let Some(row) = sqlx::query(
        r#"
        select c.id, c.name, c.blueprint_id, b.name as blueprint_name, c.status, c.created_at
        from contracts c
        join blueprints b on b.id = c.blueprint_id
        where c.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .context("load_contract failed")?
    else {
        return Ok(None);
    };

    let mut contract = contract_from_row(&row)?;
    contract.fields = sqlx::query(
        r#"
        select id, field_type, label, position_x, position_y, value
        from contract_fields
        where contract_id = $1
        order by id
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await
    .context("load_contract fields failed")?
    .iter()
    .map(contract_field_from_row)
    .collect::<Result<Vec<_>>>()?;

    Ok(Some(contract))
}

async fn lock_contract_status(conn: &mut PgConnection, id: i64) -> Result<Option<ContractStatus>> {
    let row: Option<(String,)> =
        sqlx::query_as::<_, (String,)>("select status from contracts where id = $1 for update")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .context("lock contract failed")?;
    row.map(|(s,)| parse_status(&s)).transpose()
}

// ---------------------------------------------------------------------------
// Row decoding
// ---------------------------------------------------------------------------

fn parse_status(s: &str) -> Result<ContractStatus> {
    ContractStatus::parse(s).ok_or_else(|| anyhow!("invalid contract status in db: {s}"))
}

fn parse_field_type(s: &str) -> Result<FieldType> {
    FieldType::parse(s).ok_or_else(|| anyhow!("invalid field_type in db: {s}"))
}

fn blueprint_field_from_row(r: &PgRow) -> Result<BlueprintField> {
    Ok(BlueprintField {
        id: r.try_get("id")?,
        field_type: parse_field_type(&r.try_get::<String, _>("field_type")?)?,
        label: r.try_get("label")?,
        position_x: r.try_get("position_x")?,
        position_y: r.try_get("position_y")?,
    })
}

fn contract_field_from_row(r: &PgRow) -> Result<ContractField> {
    Ok(ContractField {
        id: r.try_get("id")?,
        field_type: parse_field_type(&r.try_get::<String, _>("field_type")?)?,
        label: r.try_get("label")?,
        position_x: r.try_get("position_x")?,
        position_y: r.try_get("position_y")?,
        value: r.try_get("value")?,
    })
}

/// Decodes the contract columns; `fields` is left empty for the caller.
fn contract_from_row(r: &PgRow) -> Result<Contract> {
    Ok(Contract {
        id: r.try_get("id")?,
        name: r.try_get("name")?,
        blueprint_id: r.try_get("blueprint_id")?,
        blueprint_name: r.try_get("blueprint_name")?,
        status: parse_status(&r.try_get::<String, _>("status")?)?,
        created_at: r.try_get("created_at")?,
        fields: Vec::new(),
    })
}

/// Detect a Postgres foreign_key_violation (23503).
fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23503"),
        _ => false,
    }
}
