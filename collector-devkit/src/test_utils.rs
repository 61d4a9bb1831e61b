/*!
Test harness for the collection engine

Wires a `FakeTeslaApi`, a `MockSink` and a real `TeslaClient` together so a
test only has to script the fleet and assert on what reached the sink.
*/

use anyhow::Result;
use std::time::Duration;
use vehicle_collector::{
    CollectionEngine, CollectorError, FieldValue, PollingConfig, TeslaClient, TeslaConfig,
};

use crate::fake_api::FakeTeslaApi;
use crate::sink_stub::MockSink;

/// Engine type produced by the harness
pub type HarnessEngine = CollectionEngine<TeslaClient, MockSink>;

pub struct TestHarness {
    pub api: FakeTeslaApi,
    pub sink: MockSink,
    token_ttl: Duration,
}

impl TestHarness {
    /// Start a fake API with an empty fleet
    pub async fn new() -> Result<Self> {
        env_logger::try_init().ok();

        Ok(Self {
            api: FakeTeslaApi::start().await?,
            sink: MockSink::new(),
            token_ttl: Duration::from_secs(14_400),
        })
    }

    /// Register vehicles `(id, vin)` answering with default snapshots
    pub fn with_fleet(self, vehicles: &[(&str, &str)]) -> Self {
        for (id, vin) in vehicles {
            self.api.add_vehicle(id, vin);
        }
        self
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Client configuration pointing at the fake API
    pub fn tesla_config(&self, allow_list: &[&str]) -> TeslaConfig {
        TeslaConfig {
            refresh_token: "test-refresh-token".to_string(),
            vehicles: allow_list.iter().map(|s| s.to_string()).collect(),
            token_ttl: self.token_ttl,
            api_url: self.api.base_url().to_string(),
            auth_url: self.api.base_url().to_string(),
        }
    }

    pub fn client(&self) -> TeslaClient {
        TeslaClient::new(reqwest_client(), &self.tesla_config(&[]))
    }

    /// Start an engine over the fake API; the harness keeps a handle on its sink
    pub async fn engine(&self, allow_list: &[&str]) -> Result<HarnessEngine, CollectorError> {
        let config = self.tesla_config(allow_list);
        let client = TeslaClient::new(reqwest_client(), &config);
        CollectionEngine::start(client, self.sink.clone(), &config.vehicles, polling(10_000, 0)).await
    }

    /// Assert a field is present with the given value in the latest point
    pub fn assert_field_equals(&self, vehicle: &str, measurement: &str, field: &str, expected: FieldValue) -> Result<()> {
        match self.sink.last_field(vehicle, measurement, field) {
            Some(actual) if actual == expected => Ok(()),
            Some(actual) => anyhow::bail!(
                "Field '{}.{}' for {}: expected {:?}, got {:?}",
                measurement, field, vehicle, expected, actual
            ),
            None => anyhow::bail!("Field '{}.{}' missing for {}", measurement, field, vehicle),
        }
    }

    /// Assert a field is absent from the latest point (which must exist)
    pub fn assert_field_absent(&self, vehicle: &str, measurement: &str, field: &str) -> Result<()> {
        let point = self
            .sink
            .last_point(vehicle, measurement)
            .ok_or_else(|| anyhow::anyhow!("No '{}' point for {}", measurement, vehicle))?;

        if let Some(value) = point.field_value(field) {
            anyhow::bail!("Field '{}.{}' should be absent, got {:?}", measurement, field, value);
        }
        Ok(())
    }
}

/// Polling settings in milliseconds, with a short request timeout
pub fn polling(interval_ms: u64, jitter_ms: u64) -> PollingConfig {
    PollingConfig {
        interval: Duration::from_millis(interval_ms),
        jitter: Duration::from_millis(jitter_ms),
        request_timeout: Duration::from_secs(5),
    }
}

fn reqwest_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap_or_default()
}
