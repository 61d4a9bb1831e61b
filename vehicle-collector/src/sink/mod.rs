//! Time-series sink interface
//!
//! The engine only ever writes points into the sink's buffer and asks for an
//! explicit flush once per cycle. [`InfluxSink`] is the production
//! implementation; tests use recording doubles.

mod influx;

pub use influx::InfluxSink;

use async_trait::async_trait;

use crate::error::SinkError;
use crate::metrics::MetricPoint;

#[async_trait]
pub trait MetricsSink: Send {
    /// Append points to the write buffer
    fn write_points(&mut self, points: Vec<MetricPoint>);

    /// Number of buffered points not yet flushed
    fn pending(&self) -> usize;

    /// Submit the buffered batch; returns the number of points written
    async fn flush(&mut self) -> Result<usize, SinkError>;
}
