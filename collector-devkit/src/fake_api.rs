/*!
In-process fake servers for integration tests

- `FakeTeslaApi`: token endpoint + vehicle list + `vehicle_data`, with
  scripted replies per vehicle and request counters
- `FakeInflux`: `/api/v2/write` endpoint recording every line-protocol body

Both bind `127.0.0.1:0` and serve until dropped.
*/

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::fixtures::{vehicle_list, SnapshotBuilder};

/// Scripted answer for `vehicle_data`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleReply {
    /// 200 with the registered snapshot
    Online,
    /// 408, vehicle asleep
    Asleep,
    /// Any other status, empty body
    Status(u16),
}

struct ApiState {
    fleet: Vec<String>,
    snapshots: HashMap<String, Value>,
    replies: HashMap<String, VehicleReply>,
    vehicles_status: u16,
    token_status: u16,
    token_body: Option<Value>,
    expires_in: i64,
    issued_tokens: usize,
    token_forms: Vec<HashMap<String, String>>,
    data_requests: Vec<String>,
    bearer_tokens: Vec<String>,
}

type SharedApi = Arc<Mutex<ApiState>>;

/// Fake owner API + auth server
pub struct FakeTeslaApi {
    base_url: String,
    state: SharedApi,
    handle: JoinHandle<()>,
}

impl FakeTeslaApi {
    /// Start on an ephemeral port with an empty fleet
    pub async fn start() -> Result<Self> {
        let state: SharedApi = Arc::new(Mutex::new(ApiState {
            fleet: Vec::new(),
            snapshots: HashMap::new(),
            replies: HashMap::new(),
            vehicles_status: 200,
            token_status: 200,
            token_body: None,
            expires_in: 28_800,
            issued_tokens: 0,
            token_forms: Vec::new(),
            data_requests: Vec::new(),
            bearer_tokens: Vec::new(),
        }));

        let router = Router::new()
            .route("/oauth2/v3/token", post(token))
            .route("/api/1/vehicles", get(vehicles))
            .route("/api/1/vehicles/{id}/vehicle_data", get(vehicle_data))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                log::error!("Fake API server stopped: {}", e);
            }
        });

        log::info!("🚗 Fake telemetry API listening on {}", addr);
        Ok(Self {
            base_url: format!("http://{}/", addr),
            state,
            handle,
        })
    }

    /// Base URL with trailing slash; serves as both API and auth URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Register a vehicle (appended to the fleet) answering with a default snapshot
    pub fn add_vehicle(&self, id: &str, vin: &str) {
        self.add_vehicle_with(id, SnapshotBuilder::driving(id, vin).build());
    }

    /// Register a vehicle with an explicit snapshot document
    pub fn add_vehicle_with(&self, id: &str, snapshot: Value) {
        let mut state = self.state.lock();
        if !state.fleet.iter().any(|v| v == id) {
            state.fleet.push(id.to_string());
        }
        state.snapshots.insert(id.to_string(), snapshot);
        state.replies.insert(id.to_string(), VehicleReply::Online);
    }

    pub fn set_reply(&self, id: &str, reply: VehicleReply) {
        self.state.lock().replies.insert(id.to_string(), reply);
    }

    pub fn set_vehicles_status(&self, status: u16) {
        self.state.lock().vehicles_status = status;
    }

    pub fn set_token_status(&self, status: u16) {
        self.state.lock().token_status = status;
    }

    /// Replace the token response body (malformed payload tests)
    pub fn set_token_body(&self, body: Value) {
        self.state.lock().token_body = Some(body);
    }

    /// `expires_in` of issued tokens, seconds (may be negative)
    pub fn set_expires_in(&self, seconds: i64) {
        self.state.lock().expires_in = seconds;
    }

    /// Number of token refresh requests received
    pub fn token_requests(&self) -> usize {
        self.state.lock().token_forms.len()
    }

    /// Form of the latest token request
    pub fn last_token_form(&self) -> Option<HashMap<String, String>> {
        self.state.lock().token_forms.last().cloned()
    }

    /// Vehicle ids of every `vehicle_data` request, in order
    pub fn data_requests(&self) -> Vec<String> {
        self.state.lock().data_requests.clone()
    }

    /// Bearer tokens presented on API requests, in order
    pub fn bearer_tokens(&self) -> Vec<String> {
        self.state.lock().bearer_tokens.clone()
    }

    pub fn clear_requests(&self) {
        let mut state = self.state.lock();
        state.token_forms.clear();
        state.data_requests.clear();
        state.bearer_tokens.clear();
    }
}

impl Drop for FakeTeslaApi {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn token(State(state): State<SharedApi>, Form(form): Form<HashMap<String, String>>) -> Response {
    let mut state = state.lock();
    state.token_forms.push(form);

    if state.token_status != 200 {
        let status = StatusCode::from_u16(state.token_status).unwrap_or(StatusCode::BAD_REQUEST);
        return (status, Json(serde_json::json!({ "error": "invalid_grant" }))).into_response();
    }
    if let Some(body) = state.token_body.clone() {
        return Json(body).into_response();
    }

    state.issued_tokens += 1;
    let body = serde_json::json!({
        "access_token": format!("access-{}", state.issued_tokens),
        "refresh_token": format!("refresh-{}", state.issued_tokens),
        "expires_in": state.expires_in,
        "token_type": "Bearer"
    });
    Json(body).into_response()
}

/// Records the bearer token; `None` when the header is missing or malformed
fn authorize(state: &mut ApiState, headers: &HeaderMap) -> Option<()> {
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))?
        .to_string();
    state.bearer_tokens.push(bearer);
    Some(())
}

async fn vehicles(State(state): State<SharedApi>, headers: HeaderMap) -> Response {
    let mut state = state.lock();
    if authorize(&mut state, &headers).is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if state.vehicles_status != 200 {
        return status_only(state.vehicles_status);
    }

    let ids: Vec<&str> = state.fleet.iter().map(String::as_str).collect();
    Json(vehicle_list(&ids)).into_response()
}

async fn vehicle_data(State(state): State<SharedApi>, Path(id): Path<String>, headers: HeaderMap) -> Response {
    let mut state = state.lock();
    if authorize(&mut state, &headers).is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    state.data_requests.push(id.clone());

    match state.replies.get(&id).copied() {
        None => StatusCode::NOT_FOUND.into_response(),
        Some(VehicleReply::Asleep) => StatusCode::REQUEST_TIMEOUT.into_response(),
        Some(VehicleReply::Status(status)) => status_only(status),
        Some(VehicleReply::Online) => {
            let snapshot = state.snapshots.get(&id).cloned().unwrap_or(Value::Null);
            Json(serde_json::json!({ "response": snapshot })).into_response()
        }
    }
}

fn status_only(status: u16) -> Response {
    StatusCode::from_u16(status)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        .into_response()
}

/// One request received by `FakeInflux`
#[derive(Debug, Clone)]
pub struct WriteRequest {
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
    pub body: String,
}

#[derive(Default)]
struct InfluxState {
    writes: Vec<WriteRequest>,
    reject_status: Option<u16>,
}

type SharedInflux = Arc<Mutex<InfluxState>>;

/// Fake InfluxDB v2 write endpoint
pub struct FakeInflux {
    url: String,
    state: SharedInflux,
    handle: JoinHandle<()>,
}

impl FakeInflux {
    pub async fn start() -> Result<Self> {
        let state = SharedInflux::default();
        let router = Router::new()
            .route("/api/v2/write", post(write))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                log::error!("Fake InfluxDB server stopped: {}", e);
            }
        });

        log::info!("📈 Fake InfluxDB listening on {}", addr);
        Ok(Self {
            url: format!("http://{}", addr),
            state,
            handle,
        })
    }

    /// Base URL without trailing slash
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn reject_writes(&self, status: u16) {
        self.state.lock().reject_status = Some(status);
    }

    pub fn writes(&self) -> Vec<WriteRequest> {
        self.state.lock().writes.clone()
    }

    /// All received lines across writes
    pub fn lines(&self) -> Vec<String> {
        self.state
            .lock()
            .writes
            .iter()
            .flat_map(|w| w.body.lines().map(String::from).collect::<Vec<_>>())
            .collect()
    }
}

impl Drop for FakeInflux {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn write(
    State(state): State<SharedInflux>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let mut state = state.lock();
    state.writes.push(WriteRequest {
        query,
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        body,
    });

    match state.reject_status {
        Some(status) => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_REQUEST),
            "partial write: field type conflict",
        )
            .into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}
