/*!
Mock metrics sink for tests without InfluxDB

Records every point written into the buffer and every flushed batch.
Clones share the same recording, so a test keeps one handle while the engine
owns another.
*/

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use vehicle_collector::{FieldValue, MetricPoint, MetricsSink, SinkError};

#[derive(Default)]
struct Recording {
    buffer: Vec<MetricPoint>,
    batches: Vec<Vec<MetricPoint>>,
    flush_calls: usize,
    reject_status: Option<u16>,
}

/// Mock sink implementing `MetricsSink`
#[derive(Clone, Default)]
pub struct MockSink {
    inner: Arc<Mutex<Recording>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following flush fail with the given HTTP status
    pub fn reject_flushes(&self, status: u16) {
        self.inner.lock().reject_status = Some(status);
    }

    pub fn accept_flushes(&self) {
        self.inner.lock().reject_status = None;
    }

    /// Successfully flushed batches, oldest first
    pub fn batches(&self) -> Vec<Vec<MetricPoint>> {
        self.inner.lock().batches.clone()
    }

    /// Every point from every successful batch
    pub fn flushed_points(&self) -> Vec<MetricPoint> {
        self.inner.lock().batches.iter().flatten().cloned().collect()
    }

    pub fn flush_calls(&self) -> usize {
        self.inner.lock().flush_calls
    }

    /// Flushed points for one vehicle tag
    pub fn points_for_vehicle(&self, vehicle: &str) -> Vec<MetricPoint> {
        self.flushed_points()
            .into_iter()
            .filter(|p| p.tags.get("vehicle").map(String::as_str) == Some(vehicle))
            .collect()
    }

    /// Latest flushed point of a measurement for a vehicle
    pub fn last_point(&self, vehicle: &str, measurement: &str) -> Option<MetricPoint> {
        self.points_for_vehicle(vehicle)
            .into_iter()
            .rev()
            .find(|p| p.measurement == measurement)
    }

    /// Field of the latest flushed point, if present
    pub fn last_field(&self, vehicle: &str, measurement: &str, field: &str) -> Option<FieldValue> {
        self.last_point(vehicle, measurement)
            .and_then(|p| p.field_value(field).cloned())
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.buffer.clear();
        inner.batches.clear();
        inner.flush_calls = 0;
    }
}

#[async_trait]
impl MetricsSink for MockSink {
    fn write_points(&mut self, points: Vec<MetricPoint>) {
        log::debug!("[MOCK] Buffered {} points", points.len());
        self.inner.lock().buffer.extend(points);
    }

    fn pending(&self) -> usize {
        self.inner.lock().buffer.len()
    }

    async fn flush(&mut self) -> Result<usize, SinkError> {
        let mut inner = self.inner.lock();
        inner.flush_calls += 1;
        let batch = std::mem::take(&mut inner.buffer);

        if let Some(status) = inner.reject_status {
            log::info!("📤 [MOCK] Rejected batch of {} points", batch.len());
            return Err(SinkError::Rejected {
                status,
                body: "mock sink rejection".to_string(),
            });
        }

        let count = batch.len();
        inner.batches.push(batch);
        log::info!("📤 [MOCK] Flushed {} points", count);
        Ok(count)
    }
}
