use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "pact")]
#[command(about = "Contract lifecycle operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Print the lifecycle policy for one status, or the whole table
    Policy {
        /// CREATED | APPROVED | SENT | SIGNED | LOCKED | REVOKED
        #[arg(long)]
        status: Option<String>,
    },

    /// Blueprint commands
    Blueprint {
        #[command(subcommand)]
        cmd: BlueprintCmd,
    },

    /// Contract commands
    Contract {
        #[command(subcommand)]
        cmd: ContractCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations.
    Migrate,
}

#[derive(Subcommand)]
enum BlueprintCmd {
    /// List blueprints, newest first
    List,

    /// Print one blueprint with its fields
    Show {
        #[arg(long)]
        id: i64,
    },

    /// Create a blueprint from a JSON file: {name, fields: [...]}
    Create {
        #[arg(long)]
        file: String,
    },

    /// Delete an unreferenced blueprint
    Delete {
        #[arg(long)]
        id: i64,
    },
}

#[derive(Subcommand)]
enum ContractCmd {
    /// List contracts, newest first
    List {
        /// Comma-separated statuses (e.g. APPROVED,SENT)
        #[arg(long)]
        status: Option<String>,
    },

    /// Print one contract with policy-derived fields
    Show {
        #[arg(long)]
        id: i64,
    },

    /// Instantiate a contract from a blueprint
    Create {
        #[arg(long)]
        blueprint_id: i64,

        #[arg(long)]
        name: String,
    },

    /// Move a contract to a new status
    Transition {
        #[arg(long)]
        id: i64,

        #[arg(long)]
        to: String,
    },

    /// Set one field value (omit --value to clear it)
    SetField {
        #[arg(long)]
        id: i64,

        #[arg(long)]
        field_id: i64,

        #[arg(long)]
        value: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = pact_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = pact_db::status(&pool).await?;
                    println!(
                        "db_ok={} has_contracts_table={}",
                        s.ok, s.has_contracts_table
                    );
                }
                DbCmd::Migrate => {
                    pact_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => commands::config_hash(&paths)?,

        Commands::Policy { status } => commands::policy(status.as_deref())?,

        Commands::Blueprint { cmd } => {
            let svc = commands::connect_service().await?;
            match cmd {
                BlueprintCmd::List => commands::blueprint::list(&svc).await?,
                BlueprintCmd::Show { id } => commands::blueprint::show(&svc, id).await?,
                BlueprintCmd::Create { file } => commands::blueprint::create(&svc, &file).await?,
                BlueprintCmd::Delete { id } => commands::blueprint::delete(&svc, id).await?,
            }
        }

        Commands::Contract { cmd } => {
            let svc = commands::connect_service().await?;
            match cmd {
                ContractCmd::List { status } => {
                    commands::contract::list(&svc, status.as_deref()).await?
                }
                ContractCmd::Show { id } => commands::contract::show(&svc, id).await?,
                ContractCmd::Create { blueprint_id, name } => {
                    commands::contract::create(&svc, blueprint_id, name).await?
                }
                ContractCmd::Transition { id, to } => {
                    commands::contract::transition(&svc, id, to).await?
                }
                ContractCmd::SetField {
                    id,
                    field_id,
                    value,
                } => commands::contract::set_field(&svc, id, field_id, value).await?,
            }
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays `key=value` only.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}
