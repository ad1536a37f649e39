mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{admin_with, create_admin, permission_id, send, spawn_app, status_id};

const ROLE_MANAGER: &[&str] = &["roles.read", "roles.create", "roles.update", "roles.delete", "permissions.read"];

#[tokio::test]
async fn role_lifecycle() -> Result<()> {
    let test = spawn_app().await?;
    let (manager, _) = admin_with(&test.pool, ROLE_MANAGER).await?;

    // create: code derived from the label, status defaults to active
    let (status, body) = send(
        &test.app,
        Method::POST,
        "/api/v1/roles",
        Some(&manager),
        Some(json!({ "label": "Service Desk Lead", "description": "Approves requests" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["code"], "service_desk_lead");
    assert_eq!(body["data"]["status_id"], status_id(&test.pool, "active").await?);
    let role_id = body["data"]["id"].as_i64().expect("role id");

    let (status, body) = send(&test.app, Method::GET, &format!("/api/v1/roles/{role_id}"), Some(&manager), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["label"], "Service Desk Lead");

    // relabelling regenerates the code
    let (status, body) = send(
        &test.app,
        Method::PUT,
        &format!("/api/v1/roles/{role_id}"),
        Some(&manager),
        Some(json!({ "label": "Front Desk" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["code"], "front_desk");

    let (status, body) = send(&test.app, Method::DELETE, &format!("/api/v1/roles/{role_id}"), Some(&manager), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Role deleted successfully");

    let (status, _) = send(&test.app, Method::GET, &format!("/api/v1/roles/{role_id}"), Some(&manager), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn role_validation_and_constraints() -> Result<()> {
    let test = spawn_app().await?;
    let (manager, manager_role) = admin_with(&test.pool, ROLE_MANAGER).await?;

    let (status, body) = send(&test.app, Method::POST, "/api/v1/roles", Some(&manager), Some(json!({}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Label is required");

    let (status, _) = send(
        &test.app,
        Method::POST,
        "/api/v1/roles",
        Some(&manager),
        Some(json!({ "label": "Auditor", "status_id": 9999 })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&test.app, Method::POST, "/api/v1/roles", Some(&manager), Some(json!({ "label": "Auditor" }))).await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&test.app, Method::POST, "/api/v1/roles", Some(&manager), Some(json!({ "label": "auditor" }))).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Role with this code already exists");

    let (status, body) = send(
        &test.app,
        Method::PUT,
        &format!("/api/v1/roles/{manager_role}"),
        Some(&manager),
        Some(json!({})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No fields to update");

    // the manager's own role is still assigned to an admin
    let (status, _) = send(&test.app, Method::DELETE, &format!("/api/v1/roles/{manager_role}"), Some(&manager), None).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn granting_is_idempotent_and_revoking_a_missing_grant_is_not_found() -> Result<()> {
    let test = spawn_app().await?;
    let (manager, _) = admin_with(&test.pool, ROLE_MANAGER).await?;
    let (_, target_role) = admin_with(&test.pool, &[]).await?;
    let approve = permission_id(&test.pool, "requests.approve").await?;
    let uri = format!("/api/v1/roles/{target_role}/permissions");

    for _ in 0..2 {
        let (status, body) = send(&test.app, Method::POST, &uri, Some(&manager), Some(json!({ "permission_id": approve }))).await?;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["data"]["permission_id"], approve);
    }

    let (_, body) = send(&test.app, Method::GET, &uri, Some(&manager), None).await?;
    assert_eq!(body["count"], 1);

    let (status, _) = send(&test.app, Method::POST, &uri, Some(&manager), Some(json!({ "permission_id": 99999 }))).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let revoke = format!("{uri}/{approve}");
    let (status, _) = send(&test.app, Method::DELETE, &revoke, Some(&manager), None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&test.app, Method::DELETE, &revoke, Some(&manager), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn granting_needs_both_role_update_and_permission_read() -> Result<()> {
    let test = spawn_app().await?;
    let (updater, _) = admin_with(&test.pool, &["roles.update"]).await?;
    let (_, target_role) = admin_with(&test.pool, &[]).await?;
    let approve = permission_id(&test.pool, "requests.approve").await?;

    let (status, body) = send(
        &test.app,
        Method::POST,
        &format!("/api/v1/roles/{target_role}/permissions"),
        Some(&updater),
        Some(json!({ "permission_id": approve })),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Required all of: roles.update, permissions.read");
    Ok(())
}

#[tokio::test]
async fn deleting_an_unused_role_drops_its_grants() -> Result<()> {
    let test = spawn_app().await?;
    let (manager, _) = admin_with(&test.pool, ROLE_MANAGER).await?;
    let (former, spare_role) = admin_with(&test.pool, &["requests.approve"]).await?;

    sqlx::query("DELETE FROM admins WHERE id = ?").bind(&former).execute(&test.pool).await?;
    // a second admin on another role keeps the table non-trivial
    let other_role = common::create_role(&test.pool, "clerk").await?;
    create_admin(&test.pool, "clerk@city.gov", other_role, "enabled").await?;

    let (status, _) = send(&test.app, Method::DELETE, &format!("/api/v1/roles/{spare_role}"), Some(&manager), None).await?;
    assert_eq!(status, StatusCode::OK);

    let grants: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roles_permissions WHERE role_id = ?")
        .bind(spare_role)
        .fetch_one(&test.pool)
        .await?;
    assert_eq!(grants, 0);
    Ok(())
}
