mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use sqlx::SqlitePool;

use citizen_services::authz::{AdminIdentity, PermissionGate, PermissionResolver, DEFAULT_FORBIDDEN_MESSAGE};
use common::{admin_with, grant, migrated_pool, permission_id, send, spawn_app};

async fn whoami(identity: AdminIdentity) -> Json<Value> {
    Json(json!({ "admin_id": identity.admin_id, "role_id": identity.role_id }))
}

fn requests_router(pool: &SqlitePool) -> Router {
    let resolver = PermissionResolver::sqlite(pool.clone());

    Router::new()
        .route(
            "/requests/:id",
            delete(whoami).route_layer(PermissionGate::require_permission(resolver.clone(), "requests.delete")),
        )
        .route(
            "/requests/:id/review",
            get(whoami).route_layer(PermissionGate::require_any_permission(
                resolver.clone(),
                ["requests.approve", "requests.delete"],
            )),
        )
        .route(
            "/requests/:id/purge",
            post(whoami).route_layer(
                PermissionGate::require_all_permissions(resolver.clone(), ["requests.approve", "requests.delete"])
                    .with_forbidden_message("Purging needs approve and delete rights"),
            ),
        )
}

#[tokio::test]
async fn granted_request_reaches_the_handler_with_identity() -> Result<()> {
    let (pool, _dir) = migrated_pool().await?;
    let (admin_id, role_id) = admin_with(&pool, &["requests.delete"]).await?;
    let app = requests_router(&pool);

    let (status, body) = send(&app, Method::DELETE, "/requests/7", Some(&admin_id), None).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["admin_id"], admin_id.as_str());
    assert_eq!(body["role_id"], role_id);
    Ok(())
}

#[tokio::test]
async fn missing_permission_is_forbidden() -> Result<()> {
    let (pool, _dir) = migrated_pool().await?;
    let (admin_id, _) = admin_with(&pool, &["requests.approve"]).await?;
    let app = requests_router(&pool);

    let (status, body) = send(&app, Method::DELETE, "/requests/7", Some(&admin_id), None).await?;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body,
        json!({
            "success": false,
            "error": DEFAULT_FORBIDDEN_MESSAGE,
            "message": "Required permission: requests.delete"
        })
    );
    Ok(())
}

#[tokio::test]
async fn missing_admin_id_is_unauthenticated() -> Result<()> {
    let (pool, _dir) = migrated_pool().await?;
    let app = requests_router(&pool);

    let (status, body) = send(&app, Method::DELETE, "/requests/7", None, None).await?;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "success": false, "error": "Admin authentication required" }));

    let (status, _) = send(&app, Method::DELETE, "/requests/7", Some("   "), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn unknown_admin_is_forbidden_not_unauthenticated() -> Result<()> {
    let (pool, _dir) = migrated_pool().await?;
    let app = requests_router(&pool);

    let (status, body) = send(&app, Method::DELETE, "/requests/7", Some("ghost"), None).await?;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Required permission: requests.delete");
    Ok(())
}

#[tokio::test]
async fn any_of_passes_with_a_single_match() -> Result<()> {
    let (pool, _dir) = migrated_pool().await?;
    let (approver, _) = admin_with(&pool, &["requests.approve"]).await?;
    let (nobody, _) = admin_with(&pool, &["roles.read"]).await?;
    let app = requests_router(&pool);

    let (status, _) = send(&app, Method::GET, "/requests/7/review", Some(&approver), None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::GET, "/requests/7/review", Some(&nobody), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Required one of: requests.approve, requests.delete");
    Ok(())
}

#[tokio::test]
async fn all_of_needs_every_code() -> Result<()> {
    let (pool, _dir) = migrated_pool().await?;
    let (approver, role_id) = admin_with(&pool, &["requests.approve"]).await?;
    let app = requests_router(&pool);

    let (status, body) = send(&app, Method::POST, "/requests/7/purge", Some(&approver), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Purging needs approve and delete rights");
    assert_eq!(body["message"], "Required all of: requests.approve, requests.delete");

    grant(&pool, role_id, "requests.delete").await?;

    let (status, _) = send(&app, Method::POST, "/requests/7/purge", Some(&approver), None).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn store_failure_is_a_server_error() -> Result<()> {
    let (pool, _dir) = migrated_pool().await?;
    let (admin_id, _) = admin_with(&pool, &["requests.delete"]).await?;
    let app = requests_router(&pool);

    pool.close().await;

    let (status, body) = send(&app, Method::DELETE, "/requests/7", Some(&admin_id), None).await?;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Error checking permissions");
    assert!(body["message"].is_string());
    Ok(())
}

#[tokio::test]
async fn revoking_through_the_api_applies_to_the_next_request() -> Result<()> {
    let test = spawn_app().await?;
    let (operator, _) = admin_with(&test.pool, &["roles.update", "permissions.read"]).await?;
    let (reader, reader_role) = admin_with(&test.pool, &["roles.read"]).await?;

    let (status, _) = send(&test.app, Method::GET, "/api/v1/roles", Some(&reader), None).await?;
    assert_eq!(status, StatusCode::OK);

    let roles_read = permission_id(&test.pool, "roles.read").await?;
    let uri = format!("/api/v1/roles/{reader_role}/permissions/{roles_read}");
    let (status, _) = send(&test.app, Method::DELETE, &uri, Some(&operator), None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&test.app, Method::GET, "/api/v1/roles", Some(&reader), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Required permission: roles.read");
    Ok(())
}

#[tokio::test]
async fn each_method_on_a_path_has_its_own_requirement() -> Result<()> {
    let test = spawn_app().await?;
    let (reader, _) = admin_with(&test.pool, &["roles.read"]).await?;

    let (status, _) = send(&test.app, Method::GET, "/api/v1/roles", Some(&reader), None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &test.app,
        Method::POST,
        "/api/v1/roles",
        Some(&reader),
        Some(json!({ "label": "Auditor" })),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Required permission: roles.create");
    Ok(())
}

#[tokio::test]
async fn role_permission_listing_accepts_either_read_permission() -> Result<()> {
    let test = spawn_app().await?;
    let (perm_reader, role_id) = admin_with(&test.pool, &["permissions.read"]).await?;
    let (admin_reader, _) = admin_with(&test.pool, &["admins.read"]).await?;
    let uri = format!("/api/v1/roles/{role_id}/permissions");

    let (status, body) = send(&test.app, Method::GET, &uri, Some(&perm_reader), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["code"], "permissions.read");

    let (status, _) = send(&test.app, Method::GET, &uri, Some(&admin_reader), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}
