#![allow(dead_code)]

use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt; // for `oneshot`

use citizen_services::authz::ADMIN_ID_HEADER;
use citizen_services::create_app;
use citizen_services::utils::hash_password;

pub const TEST_PASSWORD: &str = "password123";

/// A migrated temp-file database and the full application router on top of it.
pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    // keeps the database file alive for the test's duration
    _dir: TempDir,
}

pub async fn migrated_pool() -> Result<(SqlitePool, TempDir)> {
    let dir = tempdir()?;
    let db_path = dir.path().join("test.db");

    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator =
        sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    Ok((pool, dir))
}

pub async fn spawn_app() -> Result<TestApp> {
    let (pool, dir) = migrated_pool().await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;

    Ok(TestApp { app, pool, _dir: dir })
}

pub async fn status_id(pool: &SqlitePool, code: &str) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT id FROM statuses WHERE code = ?")
        .bind(code)
        .fetch_one(pool)
        .await?)
}

pub async fn permission_id(pool: &SqlitePool, code: &str) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT id FROM permissions WHERE code = ?")
        .bind(code)
        .fetch_one(pool)
        .await?)
}

pub async fn create_role(pool: &SqlitePool, code: &str) -> Result<i64> {
    let active = status_id(pool, "active").await?;
    let result = sqlx::query(
        "INSERT INTO roles (label, code, status_id, created_at, updated_at) VALUES (?, ?, ?, datetime('now'), datetime('now'))",
    )
    .bind(code)
    .bind(code)
    .bind(active)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn grant(pool: &SqlitePool, role_id: i64, code: &str) -> Result<()> {
    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO roles_permissions (role_id, permission_id, created_at) \
         SELECT ?, id, datetime('now') FROM permissions WHERE code = ?",
    )
    .bind(role_id)
    .bind(code)
    .execute(pool)
    .await?;
    anyhow::ensure!(inserted.rows_affected() <= 1, "unexpected grant result for {code}");

    Ok(())
}

pub async fn revoke(pool: &SqlitePool, role_id: i64, code: &str) -> Result<()> {
    sqlx::query(
        "DELETE FROM roles_permissions WHERE role_id = ? AND permission_id = (SELECT id FROM permissions WHERE code = ?)",
    )
    .bind(role_id)
    .bind(code)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_admin(pool: &SqlitePool, email: &str, role_id: i64, status: &str) -> Result<String> {
    let id = uuid::Uuid::new_v4().to_string();
    let status = status_id(pool, status).await?;

    sqlx::query(
        "INSERT INTO admins (id, email, password_hash, country, role_id, status_id, created_at, updated_at) \
         VALUES (?, ?, ?, 'KEN', ?, ?, datetime('now'), datetime('now'))",
    )
    .bind(&id)
    .bind(email)
    .bind(hash_password(TEST_PASSWORD)?)
    .bind(role_id)
    .bind(status)
    .execute(pool)
    .await?;

    Ok(id)
}

pub async fn create_citizen(pool: &SqlitePool, email: &str) -> Result<String> {
    let id = uuid::Uuid::new_v4().to_string();
    let active = status_id(pool, "active").await?;

    sqlx::query(
        "INSERT INTO citizens (id, email, country, status_id, created_at, updated_at) \
         VALUES (?, ?, 'KEN', ?, datetime('now'), datetime('now'))",
    )
    .bind(&id)
    .bind(email)
    .bind(active)
    .execute(pool)
    .await?;

    Ok(id)
}

/// A fresh role holding exactly `codes`, and an enabled admin on it.
pub async fn admin_with(pool: &SqlitePool, codes: &[&str]) -> Result<(String, i64)> {
    let tag = uuid::Uuid::new_v4().simple().to_string();
    let role_id = create_role(pool, &format!("role_{tag}")).await?;
    for code in codes {
        grant(pool, role_id, code).await?;
    }
    let admin_id = create_admin(pool, &format!("{tag}@city.gov"), role_id, "enabled").await?;

    Ok((admin_id, role_id))
}

pub fn request(method: Method, uri: &str, admin_id: Option<&str>, body: Option<Value>) -> Result<Request<Body>> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(admin_id) = admin_id {
        builder = builder.header(ADMIN_ID_HEADER, admin_id);
    }

    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))?,
        None => builder.body(Body::empty())?,
    };
    Ok(req)
}

pub async fn call(app: &Router, req: Request<Body>) -> Result<(StatusCode, Value)> {
    let resp = app.clone().oneshot(req).await?;
    let status = resp.status();
    let body_bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;

    let json = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes)?
    };
    Ok((status, json))
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    admin_id: Option<&str>,
    body: Option<Value>,
) -> Result<(StatusCode, Value)> {
    call(app, request(method, uri, admin_id, body)?).await
}
