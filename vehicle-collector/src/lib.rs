//! Vehicle telemetry collector
//!
//! Polls a fleet's telemetry from the owner API and writes it to InfluxDB:
//! - OAuth token lifecycle (lazy refresh from a long-lived refresh token)
//! - Telemetry client with "vehicle asleep" as a normal outcome
//! - Collection engine with pacing, jitter and exponential backoff
//! - Metric point mapping and InfluxDB line-protocol sink

pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod sink;
pub mod telemetry;

pub use auth::{AccessCredential, TokenManager};
pub use config::{CollectorConfig, ConfigError, InfluxConfig, PollingConfig, TeslaConfig};
pub use engine::{CollectionEngine, CycleReport};
pub use error::{CollectorError, SinkError};
pub use metrics::{FieldValue, MetricPoint};
pub use sink::{InfluxSink, MetricsSink};
pub use telemetry::{TelemetrySnapshot, TelemetrySource, TeslaClient, VehicleData};
