//! pact-db
//!
//! Postgres persistence for blueprints and contracts, plus the [`Store`]
//! trait the contract service is written against.

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};

mod pg;
mod store;

pub use pg::PgStore;
pub use store::{BlueprintDelete, ContractFilter, FieldWrite, StatusWrite, Store};

pub const ENV_DB_URL: &str = "PACT_DATABASE_URL";

/// Connect to Postgres using PACT_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    connect_from_env_var(ENV_DB_URL, 10).await
}

/// Connect to Postgres using the URL held in environment variable `var`.
pub async fn connect_from_env_var(var: &str, max_connections: u32) -> Result<PgPool> {
    let url = std::env::var(var).with_context(|| format!("missing env var {var}"))?;
    connect(&url, max_connections).await
}

pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
        .context("failed to connect to Postgres")
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_contracts_table: bool,
}

/// Simple status query (connectivity + schema presence).
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='contracts'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_contracts_table: exists,
    })
}
