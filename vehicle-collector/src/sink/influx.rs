//! InfluxDB v2 HTTP write sink

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, warn};

use super::MetricsSink;
use crate::config::InfluxConfig;
use crate::error::SinkError;
use crate::metrics::{line_protocol, MetricPoint};

/// Buffers points and writes them through `/api/v2/write`
pub struct InfluxSink {
    http: reqwest::Client,
    write_url: String,
    token: String,
    org: String,
    bucket: String,
    buffer: Vec<MetricPoint>,
}

impl InfluxSink {
    pub fn new(http: reqwest::Client, config: &InfluxConfig) -> Self {
        Self {
            http,
            write_url: format!("{}/api/v2/write", config.url.trim_end_matches('/')),
            token: config.token.clone(),
            org: config.org.clone(),
            bucket: config.bucket.clone(),
            buffer: Vec::new(),
        }
    }
}

#[async_trait]
impl MetricsSink for InfluxSink {
    fn write_points(&mut self, points: Vec<MetricPoint>) {
        self.buffer.extend(points);
    }

    fn pending(&self) -> usize {
        self.buffer.len()
    }

    async fn flush(&mut self) -> Result<usize, SinkError> {
        // Drained up front: a failed batch is dropped, not retried
        let batch = std::mem::take(&mut self.buffer);
        if batch.is_empty() {
            return Ok(0);
        }

        let (body, skipped) = line_protocol::encode_batch(&batch);
        if skipped > 0 {
            debug!(skipped, "Skipping points without writable fields");
        }
        let written = batch.len() - skipped;
        if written == 0 {
            return Ok(0);
        }

        let response = self
            .http
            .post(&self.write_url)
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "ms"),
            ])
            .header(AUTHORIZATION, format!("Token {}", self.token))
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), points = written, "InfluxDB rejected batch");
            return Err(SinkError::Rejected { status: status.as_u16(), body });
        }

        debug!(points = written, "Batch flushed to InfluxDB");
        Ok(written)
    }
}
