use axum::Router;
use serde_json::{json, Map, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::authz::ADMIN_ID_HEADER;
use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::auth::login,
		routes::auth::me,
		routes::statuses::list_statuses,
		routes::roles::list_roles,
		routes::roles::get_role,
		routes::roles::create_role,
		routes::roles::update_role,
		routes::roles::delete_role,
		routes::roles::list_role_permissions,
		routes::roles::grant_permission,
		routes::roles::revoke_permission,
		routes::permissions::list_permissions,
		routes::permissions::get_permission,
		routes::permissions::create_permission,
		routes::permissions::update_permission,
		routes::permissions::delete_permission,
		routes::admins::list_admins,
		routes::admins::get_admin,
		routes::admins::create_admin,
		routes::admins::update_admin,
		routes::admins::delete_admin,
		routes::requests::list_requests,
		routes::requests::get_request,
		routes::requests::create_request,
		routes::requests::update_request,
		routes::requests::approve_request,
		routes::requests::reject_request,
		routes::requests::delete_request
	),
	components(
		schemas(
			routes::health::HealthResponse,
			models::status::StatusRecord,
			models::rbac::Role,
			models::rbac::RoleCreateRequest,
			models::rbac::RoleUpdateRequest,
			models::rbac::Permission,
			models::rbac::PermissionCreateRequest,
			models::rbac::PermissionUpdateRequest,
			models::rbac::RolePermission,
			models::rbac::AssignPermissionToRoleRequest,
			models::admin::Admin,
			models::admin::AdminCreateRequest,
			models::admin::AdminUpdateRequest,
			models::admin::LoginRequest,
			models::admin::AuthResponse,
			models::admin::MeResponse,
			models::request::ServiceRequest,
			models::request::ServiceRequestCreate,
			models::request::ServiceRequestUpdate,
			models::response::RoleEnvelope,
			models::response::RoleListEnvelope,
			models::response::PermissionEnvelope,
			models::response::PermissionListEnvelope,
			models::response::RolePermissionEnvelope,
			models::response::AdminEnvelope,
			models::response::AdminListEnvelope,
			models::response::ServiceRequestEnvelope,
			models::response::ServiceRequestListEnvelope,
			models::response::StatusListEnvelope,
			models::response::LoginEnvelope,
			models::response::MeEnvelope
		)
	),
	tags(
		(name = "Health", description = "Liveness and database connectivity"),
		(name = "Auth", description = "Admin login and identity"),
		(name = "Statuses", description = "Lifecycle statuses"),
		(name = "Roles", description = "Roles and their permission grants"),
		(name = "Permissions", description = "Permission catalogue"),
		(name = "Admins", description = "Administrator accounts"),
		(name = "Requests", description = "Citizen service requests and their approval")
	)
)]
pub struct ApiDoc;

/// Generated document plus the security schemes, server entry and request
/// examples Swagger UI needs for "Try it out".
pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;

	ensure_security_components(&mut doc);
	ensure_servers(&mut doc, port);
	add_request_examples(&mut doc);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> Router {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.persist_authorization(true);

	Router::new().merge(
		SwaggerUi::new("/docs")
			.url("/api-docs/openapi.json", doc)
			.config(swagger_config),
	)
}

fn object_entry<'a>(parent: &'a mut Value, key: &str) -> Option<&'a mut Map<String, Value>> {
	parent
		.as_object_mut()?
		.entry(key)
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
}

fn ensure_security_components(doc: &mut Value) {
	let Some(components) = object_entry(doc, "components") else { return; };
	let schemes = components
		.entry("securitySchemes")
		.or_insert_with(|| Value::Object(Map::new()));
	let Some(schemes) = schemes.as_object_mut() else { return; };

	schemes.insert(
		"bearerAuth".to_string(),
		json!({
			"type": "http",
			"scheme": "bearer",
			"bearerFormat": "JWT"
		}),
	);
	schemes.insert(
		"adminId".to_string(),
		json!({
			"type": "apiKey",
			"in": "header",
			"name": ADMIN_ID_HEADER
		}),
	);
}

fn ensure_servers(doc: &mut Value, port: u16) {
	let server = json!({ "url": format!("http://localhost:{port}") });

	match doc.get_mut("servers") {
		Some(Value::Array(servers)) => {
			if !servers.contains(&server) {
				servers.push(server);
			}
		}
		_ => {
			if let Some(root) = doc.as_object_mut() {
				root.insert("servers".to_string(), json!([server]));
			}
		}
	}
}

fn add_request_examples(doc: &mut Value) {
	let Some(paths) = doc.get_mut("paths").and_then(Value::as_object_mut) else { return; };

	for operations in paths.values_mut().filter_map(Value::as_object_mut) {
		for operation in operations.values_mut() {
			apply_request_example(operation);
		}
	}
}

fn apply_request_example(operation: &mut Value) {
	let Some(app_json) = operation
		.pointer_mut("/requestBody/content/application~1json")
		.and_then(Value::as_object_mut)
	else {
		return;
	};
	let Some(reference) = app_json
		.get("schema")
		.and_then(|schema| schema.get("$ref"))
		.and_then(Value::as_str)
	else {
		return;
	};

	let example = match reference {
		"#/components/schemas/LoginRequest" => json!({
			"email": "clerk@city.gov",
			"password": "S3cureP@ssw0rd"
		}),
		"#/components/schemas/RoleCreateRequest" => json!({
			"label": "Service Desk Lead",
			"description": "Approves citizen requests"
		}),
		"#/components/schemas/PermissionCreateRequest" => json!({
			"label": "Approve requests",
			"entity_code": "entity.requests",
			"action": "approve"
		}),
		"#/components/schemas/AssignPermissionToRoleRequest" => json!({ "permission_id": 13 }),
		"#/components/schemas/AdminCreateRequest" => json!({
			"email": "clerk@city.gov",
			"password": "S3cureP@ssw0rd",
			"firstname": "Amina",
			"lastname": "Otieno",
			"country": "KEN",
			"role_id": 1
		}),
		"#/components/schemas/ServiceRequestCreate" => json!({
			"title": "Birth certificate copy",
			"description": "Certified copy for a passport application",
			"citizen_id": "3c9e1b7a-5f2d-4e8a-9b61-7d0c2a4f8e15"
		}),
		_ => return,
	};

	app_json.insert("example".to_string(), example);
}
