//! Telemetry API client
//!
//! Issues authenticated requests for the vehicle list and per-vehicle data,
//! obtaining a bearer credential from the [`TokenManager`] before each call.
//! Responses are classified by status:
//! - 2xx: success
//! - 408 on `vehicle_data`: the vehicle is asleep, reported as
//!   [`VehicleData::Unavailable`] rather than an error
//! - other 4xx: [`CollectorError::Api`]
//! - anything else: a transport-level failure

mod snapshot;

pub use snapshot::{ChargeState, ClimateState, DriveState, TelemetrySnapshot, VehicleState};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::auth::TokenManager;
use crate::config::TeslaConfig;
use crate::error::{CollectorError, Result};

/// Outcome of a snapshot request that did not fail
#[derive(Debug, Clone)]
pub enum VehicleData {
    Online(TelemetrySnapshot),
    /// Vehicle asleep or unreachable (HTTP 408)
    Unavailable,
}

/// Source of vehicle telemetry consumed by the collection engine
#[async_trait]
pub trait TelemetrySource: Send {
    /// Ids of every vehicle on the account, in API order
    async fn list_vehicles(&mut self) -> Result<Vec<String>>;

    /// Latest data for one vehicle
    async fn fetch_snapshot(&mut self, vehicle_id: &str) -> Result<VehicleData>;
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response: Option<T>,
}

#[derive(Debug, Deserialize)]
struct VehicleSummary {
    id_s: String,
}

/// Owner-API client; owns the token manager for its lifetime
pub struct TeslaClient {
    http: reqwest::Client,
    api_url: String,
    tokens: TokenManager,
}

impl TeslaClient {
    pub fn new(http: reqwest::Client, config: &TeslaConfig) -> Self {
        let tokens = TokenManager::new(
            http.clone(),
            &config.auth_url,
            config.refresh_token.clone(),
            config.token_ttl,
        );

        Self {
            http,
            api_url: config.api_url.clone(),
            tokens,
        }
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Authenticated GET; only 2xx and 4xx responses are handed back
    async fn get(&mut self, endpoint: &str) -> Result<reqwest::Response> {
        let bearer = self.tokens.valid_access_token().await?.access_token.clone();

        let response = self
            .http
            .get(format!("{}{}", self.api_url, endpoint))
            .bearer_auth(bearer)
            .send()
            .await?;

        let status = response.status();
        if !within_status_policy(status) {
            return Err(CollectorError::TransportStatus { status: status.as_u16() });
        }

        Ok(response)
    }
}

fn within_status_policy(status: StatusCode) -> bool {
    status.is_success() || status.is_client_error()
}

#[async_trait]
impl TelemetrySource for TeslaClient {
    async fn list_vehicles(&mut self) -> Result<Vec<String>> {
        let response = self.get("api/1/vehicles").await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollectorError::Api { status: status.as_u16() });
        }

        let body: Envelope<Vec<VehicleSummary>> = response.json().await?;
        let vehicles: Vec<String> = body
            .response
            .unwrap_or_default()
            .into_iter()
            .map(|v| v.id_s)
            .collect();

        debug!(count = vehicles.len(), "Vehicle list received");
        Ok(vehicles)
    }

    async fn fetch_snapshot(&mut self, vehicle_id: &str) -> Result<VehicleData> {
        let response = self
            .get(&format!("api/1/vehicles/{}/vehicle_data", vehicle_id))
            .await?;

        match response.status() {
            status if status.is_success() => {
                let body: Envelope<TelemetrySnapshot> = response.json().await?;
                Ok(VehicleData::Online(body.response.unwrap_or_default()))
            }
            StatusCode::REQUEST_TIMEOUT => Ok(VehicleData::Unavailable),
            status => Err(CollectorError::Api { status: status.as_u16() }),
        }
    }
}
