use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

use crate::config::DatabaseConfig;

pub mod row_parsers;

/// Builds the pool the rest of the app borrows from and brings the schema up to date.
pub async fn init(config: &DatabaseConfig) -> anyhow::Result<SqlitePool> {
	let options = SqliteConnectOptions::from_str(&config.url)
		.with_context(|| format!("invalid DATABASE_URL: {}", config.url))?
		.create_if_missing(true)
		.foreign_keys(true);

	let pool = SqlitePoolOptions::new()
		.max_connections(config.max_connections)
		.min_connections(config.min_connections)
		.acquire_timeout(config.acquire_timeout)
		.connect_with(options)
		.await
		.context("failed to connect to database")?;

	sqlx::migrate!()
		.run(&pool)
		.await
		.context("failed to run migrations")?;

	tracing::info!(max_connections = config.max_connections, "database pool ready");

	Ok(pool)
}
