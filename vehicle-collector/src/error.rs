//! Error taxonomy for the collection engine
//!
//! Every error raised inside a cycle is one of these kinds. The engine treats
//! them uniformly: the cycle is marked failed and the backoff counter grows.
//! "Vehicle unavailable" is deliberately absent here, it is a normal outcome
//! (see [`crate::telemetry::VehicleData`]).

use thiserror::Error;

/// Errors raised by the token manager, the telemetry client or the sink
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Token endpoint refused the refresh or returned a malformed payload
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Telemetry API answered with a 4xx status other than 408
    #[error("unexpected API response: {status}")]
    Api { status: u16 },

    /// Connection, timeout or body decoding failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Status outside the accepted 2xx/4xx policy (5xx, unfollowed 3xx)
    #[error("transport error: server responded with {status}")]
    TransportStatus { status: u16 },

    /// Metrics sink failed to accept the batch
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

impl CollectorError {
    /// Short label used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::Api { .. } => "api",
            Self::Transport(_) | Self::TransportStatus { .. } => "transport",
            Self::Sink(_) => "sink",
        }
    }
}

/// Errors raised while flushing points to the time-series database
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("write rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("write request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, CollectorError>;
