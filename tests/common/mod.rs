#![allow(dead_code)]

//! In-process mock of the ERP backend.

use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use uuid::Uuid;

use erp_access::models::{Permission, Role, UserProfile};
use erp_access::navigator::RecordingNavigator;
use erp_access::session::MemorySessionStore;
use erp_access::{ApiClient, ClientConfig};

pub const PASSWORD: &str = "S3cureP@ssw0rd";
pub const ACCESS: &str = "access-1";
pub const REFRESH: &str = "refresh-1";
pub const ROTATED_ACCESS: &str = "access-2";

pub struct Backend {
    pub valid_access: String,
    pub refresh_token: String,
    pub refresh_ok: bool,
    pub codes: Vec<String>,
    pub fail_permission_codes: bool,
    pub catalog: Vec<Permission>,
    pub roles: Vec<Role>,
    pub fail_updates: bool,
    pub fail_role_list_after_update: bool,
    pub updates: Vec<(Uuid, Vec<String>)>,
    pub refresh_calls: usize,
    /// `METHOD path` plus the bearer token, if any
    pub hits: Vec<(String, Option<String>)>,
}

impl Default for Backend {
    fn default() -> Self {
        Self {
            valid_access: ACCESS.to_string(),
            refresh_token: REFRESH.to_string(),
            refresh_ok: true,
            codes: Vec::new(),
            fail_permission_codes: false,
            catalog: Vec::new(),
            roles: Vec::new(),
            fail_updates: false,
            fail_role_list_after_update: false,
            updates: Vec::new(),
            refresh_calls: 0,
            hits: Vec::new(),
        }
    }
}

impl Backend {
    pub fn with_codes(codes: &[&str]) -> Self {
        Self {
            codes: codes.iter().map(|c| c.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn hits_for(&self, route: &str) -> usize {
        self.hits.iter().filter(|(r, _)| r == route).count()
    }
}

pub type Shared = Arc<Mutex<Backend>>;

pub fn permission(code: &str) -> Permission {
    let mut parts = code.split('.');
    let module = parts.next().unwrap_or_default().to_string();
    let resource = parts.next().unwrap_or_default().to_string();
    let action = parts.next().unwrap_or_default().to_string();
    Permission {
        id: Uuid::new_v4(),
        name: format!("{action} {resource}"),
        code: code.to_string(),
        description: None,
        module,
        resource,
        action,
    }
}

pub fn role(name: &str, codes: &[&str]) -> Role {
    Role {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: None,
        permissions: codes.iter().map(|c| c.to_string()).collect(),
        user_count: 1,
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(String::from)
}

fn record(state: &Shared, route: &str, headers: &HeaderMap) -> bool {
    let mut backend = state.lock().unwrap();
    let token = bearer(headers);
    let ok = token.as_deref() == Some(backend.valid_access.as_str());
    backend.hits.push((route.to_string(), token));
    ok
}

fn unauthorized() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "unauthorized", "message": "token expired"})),
    )
}

fn server_error(message: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "internal", "message": message})),
    )
}

async fn login(State(state): State<Shared>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let backend = state.lock().unwrap();
    if body.get("password").and_then(|p| p.as_str()) != Some(PASSWORD) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "unauthorized", "message": "invalid credentials"})),
        );
    }

    let user = UserProfile {
        id: Uuid::new_v4(),
        name: "Ada Lovelace".to_string(),
        email: body.get("email").and_then(|e| e.as_str()).unwrap_or_default().to_string(),
        roles: vec!["contador".to_string()],
    };
    (
        StatusCode::OK,
        Json(json!({
            "access_token": backend.valid_access,
            "refresh_token": backend.refresh_token,
            "user": user,
        })),
    )
}

async fn refresh(State(state): State<Shared>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let mut backend = state.lock().unwrap();
    backend.refresh_calls += 1;
    let presented = body.get("refresh_token").and_then(|t| t.as_str());
    if !backend.refresh_ok || presented != Some(backend.refresh_token.as_str()) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "unauthorized", "message": "refresh rejected"})),
        );
    }

    backend.valid_access = ROTATED_ACCESS.to_string();
    (StatusCode::OK, Json(json!({"access_token": ROTATED_ACCESS})))
}

async fn logout(State(state): State<Shared>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    record(&state, "POST /auth/logout", &headers);
    (StatusCode::OK, Json(json!({"message": "Logged out"})))
}

async fn my_permissions(State(state): State<Shared>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !record(&state, "GET /auth/me/permissions", &headers) {
        return unauthorized();
    }
    let backend = state.lock().unwrap();
    if backend.fail_permission_codes {
        return server_error("database unavailable");
    }
    (StatusCode::OK, Json(json!({"codes": backend.codes})))
}

async fn list_permissions(State(state): State<Shared>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !record(&state, "GET /rbac/permissions", &headers) {
        return unauthorized();
    }
    let backend = state.lock().unwrap();
    (StatusCode::OK, Json(json!(backend.catalog)))
}

async fn list_roles(State(state): State<Shared>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !record(&state, "GET /rbac/roles", &headers) {
        return unauthorized();
    }
    let backend = state.lock().unwrap();
    if backend.fail_role_list_after_update && !backend.updates.is_empty() {
        return server_error("role list unavailable");
    }
    (StatusCode::OK, Json(json!(backend.roles)))
}

async fn update_role_permissions(
    State(state): State<Shared>,
    Path(role_id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !record(&state, "POST /rbac/roles/permissions", &headers) {
        return unauthorized();
    }
    let mut backend = state.lock().unwrap();
    if backend.fail_updates {
        return server_error("update rejected");
    }

    let codes: Vec<String> = body
        .get("permission_codes")
        .and_then(|c| serde_json::from_value(c.clone()).ok())
        .unwrap_or_default();
    backend.updates.push((role_id, codes.clone()));

    match backend.roles.iter_mut().find(|r| r.id == role_id) {
        Some(role) => {
            role.permissions = codes;
            let updated = role.clone();
            (StatusCode::OK, Json(json!(updated)))
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "not_found", "message": "Role not found"})),
        ),
    }
}

async fn probe(State(state): State<Shared>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !record(&state, "GET /probe", &headers) {
        return unauthorized();
    }
    (StatusCode::OK, Json(json!({"ok": true})))
}

async fn always_unauthorized(State(state): State<Shared>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    record(&state, "GET /locked", &headers);
    unauthorized()
}

async fn maintenance(State(state): State<Shared>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    record(&state, "GET /maintenance", &headers);
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({"error": "unavailable", "message": "maintenance window"})),
    )
}

pub fn router(state: Shared) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/me/permissions", get(my_permissions))
        .route("/rbac/permissions", get(list_permissions))
        .route("/rbac/roles", get(list_roles))
        .route("/rbac/roles/:role_id/permissions", post(update_role_permissions))
        .route("/probe", get(probe))
        .route("/locked", get(always_unauthorized))
        .route("/maintenance", get(maintenance))
        .with_state(state)
}

pub async fn spawn(backend: Backend) -> anyhow::Result<(String, Shared)> {
    let state = Arc::new(Mutex::new(backend));
    let app = router(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok((format!("http://{addr}"), state))
}

pub struct Harness {
    pub backend: Shared,
    pub session: Arc<MemorySessionStore>,
    pub navigator: Arc<RecordingNavigator>,
    pub client: Arc<ApiClient>,
}

impl Harness {
    /// Backend plus a client whose session already holds `ACCESS`/`REFRESH`.
    pub async fn logged_in(backend: Backend) -> anyhow::Result<Self> {
        Self::with_session(backend, MemorySessionStore::with_tokens(ACCESS, Some(REFRESH))).await
    }

    pub async fn with_session(backend: Backend, session: MemorySessionStore) -> anyhow::Result<Self> {
        let (base_url, backend) = spawn(backend).await?;
        let config = ClientConfig::new(&base_url)?;
        let session = Arc::new(session);
        let navigator = Arc::new(RecordingNavigator::new());
        let client = Arc::new(ApiClient::new(&config, session.clone(), navigator.clone())?);

        Ok(Self {
            backend,
            session,
            navigator,
            client,
        })
    }

    pub fn backend(&self) -> std::sync::MutexGuard<'_, Backend> {
        self.backend.lock().unwrap()
    }
}
