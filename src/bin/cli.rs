use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use citizen_services::authz::{PermissionGate, PermissionResolver, Requirement};
use citizen_services::bootstrap::{bootstrap_administrator, NewAdministrator};
use citizen_services::config::{self, DatabaseConfig};
use citizen_services::db;

#[derive(Parser, Debug)]
#[command(author, version, about = "citizen-services admin tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new empty migration with the provided name
    MakeMigration { name: String },
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Create the administrator role (granted every permission) and a first admin
    Bootstrap {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// ISO-3 country code
        #[arg(long, default_value = "USA")]
        country: String,
        #[arg(long)]
        firstname: Option<String>,
        #[arg(long)]
        lastname: Option<String>,
    },
    /// Evaluate permission codes for an admin the way the route gate does
    Check {
        admin_id: String,
        #[arg(required = true)]
        codes: Vec<String>,
        /// Granted if the admin holds at least one code
        #[arg(long, conflicts_with = "all")]
        any: bool,
        /// Granted only if the admin holds every code
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_env();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::MakeMigration { name } => {
            let path = make_migration_file(&name)?;
            println!("Created migration: {}", path.display());
        }
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::Bootstrap {
            email,
            password,
            country,
            firstname,
            lastname,
        } => {
            let pool = init_pool().await?;
            let outcome = bootstrap_administrator(
                &pool,
                NewAdministrator {
                    email: email.clone(),
                    password,
                    country,
                    firstname,
                    lastname,
                },
            )
            .await
            .with_context(|| format!("failed to bootstrap {email}"))?;
            println!("Administrator created: {} ({})", email, outcome.admin_id);
        }
        Commands::Check {
            admin_id,
            codes,
            any,
            all,
        } => {
            let pool = init_pool().await?;
            let requirement = match (codes.len(), any, all) {
                (1, false, false) => Requirement::One(codes[0].clone()),
                (_, true, _) => Requirement::Any(codes),
                _ => Requirement::All(codes),
            };
            let gate = PermissionGate::new(PermissionResolver::sqlite(pool), requirement);

            let granted = gate
                .evaluate(&admin_id)
                .await
                .context("failed to evaluate permissions")?;
            println!("{}: {}", if granted { "granted" } else { "denied" }, gate.requirement());
            if !granted {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays the command's own output.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn make_migration_file(name: &str) -> anyhow::Result<PathBuf> {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let sanitized = sanitize_name(name);
    let filename = format!("{}_{}.sql", timestamp, sanitized);
    let path = Path::new("migrations").join(filename);

    if path.exists() {
        anyhow::bail!("migration already exists: {}", path.display());
    }

    fs::write(&path, "-- Write your migration SQL here\n")
        .with_context(|| format!("failed to create migration at {}", path.display()))?;

    Ok(path)
}

/// Bare pool, no migrations applied.
async fn get_pool() -> anyhow::Result<SqlitePool> {
    let config = DatabaseConfig::from_env()?;
    let options = SqliteConnectOptions::from_str(&config.url)
        .with_context(|| format!("invalid DATABASE_URL: {}", config.url))?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await
        .context("failed to connect to database")
}

/// Pool with the schema brought up to date.
async fn init_pool() -> anyhow::Result<SqlitePool> {
    let config = DatabaseConfig::from_env()?;
    db::init(&config).await
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    // If the migrations table doesn't exist, nothing is applied yet
    let tracked: Option<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'")
            .fetch_optional(pool)
            .await?;
    let applied_versions: HashSet<i64> = if tracked.is_some() {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in migrator.iter() {
        let status = if applied_versions.contains(&migration.version) { "applied" } else { "pending" };
        let desc = migration.description.as_ref().trim();
        let name = if desc.is_empty() { "unknown" } else { desc };
        println!("{:<8} {:<20} {}", status, migration.version, name);
    }

    Ok(())
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '_' => c,
            'A'..='Z' => c.to_ascii_lowercase(),
            _ => '_',
        })
        .collect()
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    // ./migrations when run from the repo root, the crate's own folder otherwise
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let migrator_path_display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {}", migrator_path_display))
}
