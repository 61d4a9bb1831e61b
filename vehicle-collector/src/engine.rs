//! Collection engine: the poll loop
//!
//! Lifecycle:
//! - `start`: discover the fleet and resolve the tracked vehicles (fatal on failure)
//! - `run`: cycle forever until the shutdown token is cancelled
//!
//! A cycle walks the tracked vehicles in order, writes their points into the
//! sink and flushes once. The first error aborts the rest of the cycle and
//! grows the backoff counter; a clean cycle resets it. Cycles are paced on the
//! configured interval with a symmetric random jitter.

use chrono::Utc;
use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::PollingConfig;
use crate::error::{CollectorError, Result};
use crate::metrics::points_from_snapshot;
use crate::sink::MetricsSink;
use crate::telemetry::{TelemetrySource, VehicleData};

/// Upper bound for the backoff sleep between failed cycles
pub const MAX_BACKOFF: Duration = Duration::from_secs(120);

/// Summary of a cycle that completed without error
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub vehicles_polled: usize,
    pub vehicles_unavailable: usize,
    pub points_written: usize,
}

/// Vehicles to poll: the discovered fleet, narrowed to the allow-list when one is set.
/// Discovery order is preserved.
pub fn resolve_tracked(discovered: &[String], allow_list: &[String]) -> Vec<String> {
    if allow_list.is_empty() {
        return discovered.to_vec();
    }

    discovered
        .iter()
        .filter(|id| allow_list.contains(id))
        .cloned()
        .collect()
}

/// `min(2^retries, 120)` seconds
pub fn backoff_delay(retries: u32) -> Duration {
    let secs = 1u64.checked_shl(retries).unwrap_or(u64::MAX);
    Duration::from_secs(secs.min(MAX_BACKOFF.as_secs()))
}

/// Uniform offset in `[-jitter/2, +jitter/2]` milliseconds
pub fn jitter_offset<R: Rng>(jitter: Duration, rng: &mut R) -> f64 {
    let jitter_ms = jitter.as_millis() as f64;
    rng.gen::<f64>() * jitter_ms - jitter_ms / 2.0
}

/// `max(interval - elapsed + jitter, 0)`
pub fn pacing_delay(interval: Duration, elapsed: Duration, jitter_offset_ms: f64) -> Duration {
    let wait_ms = interval.as_millis() as f64 - elapsed.as_millis() as f64 + jitter_offset_ms;
    Duration::from_millis(wait_ms.max(0.0).round() as u64)
}

pub struct CollectionEngine<T, S> {
    source: T,
    sink: S,
    tracked: Vec<String>,
    polling: PollingConfig,
    retries: u32,
}

impl<T, S> CollectionEngine<T, S>
where
    T: TelemetrySource,
    S: MetricsSink,
{
    /// Discover the fleet and resolve the tracked set
    pub async fn start(mut source: T, sink: S, allow_list: &[String], polling: PollingConfig) -> Result<Self> {
        let discovered = source.list_vehicles().await?;
        let tracked = resolve_tracked(&discovered, allow_list);

        info!(
            "Logging metrics for {} of {} total vehicles: {}",
            tracked.len(),
            discovered.len(),
            tracked.join(", ")
        );
        if tracked.is_empty() {
            warn!("No vehicles to track, cycles will write nothing");
        }

        Ok(Self {
            source,
            sink,
            tracked,
            polling,
            retries: 0,
        })
    }

    pub fn tracked(&self) -> &[String] {
        &self.tracked
    }

    /// Consecutive failed cycles so far
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn source(&self) -> &T {
        &self.source
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Poll until `shutdown` is cancelled.
    ///
    /// Cancellation is honoured during the backoff and pacing sleeps; a cycle
    /// that has started always runs to completion, flush included.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        info!(
            interval_ms = self.polling.interval.as_millis() as u64,
            jitter_ms = self.polling.jitter.as_millis() as u64,
            "Collection loop started"
        );

        while !shutdown.is_cancelled() {
            let cycle_start = Instant::now();

            if self.retries > 0 {
                let backoff = backoff_delay(self.retries);
                info!(
                    "Last {} attempts failed, backing off for {}s...",
                    self.retries,
                    backoff.as_secs()
                );
                if !sleep_or_cancel(backoff, &shutdown).await {
                    break;
                }
            }

            debug!("Starting collection cycle");
            let outcome = self.run_cycle().await;
            self.complete_cycle(&outcome);

            let wait = self.next_wait(cycle_start.elapsed());
            debug!("Waiting {}ms", wait.as_millis());
            if !sleep_or_cancel(wait, &shutdown).await {
                break;
            }
        }

        info!("Collection loop stopped");
    }

    /// One pass over the tracked vehicles followed by a flush
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let mut report = CycleReport::default();

        let collected = self.collect_vehicles(&mut report).await;

        // Points already buffered are flushed even when a later vehicle failed
        let flushed = if self.sink.pending() > 0 {
            self.sink.flush().await.map(|_| ()).map_err(CollectorError::from)
        } else {
            Ok(())
        };

        collected?;
        flushed?;
        Ok(report)
    }

    async fn collect_vehicles(&mut self, report: &mut CycleReport) -> Result<()> {
        for vehicle in &self.tracked {
            debug!(vehicle = %vehicle, "Getting data");

            match self.source.fetch_snapshot(vehicle).await? {
                VehicleData::Unavailable => {
                    debug!(vehicle = %vehicle, "Vehicle unavailable, skipping");
                    report.vehicles_unavailable += 1;
                }
                VehicleData::Online(snapshot) => {
                    let points = points_from_snapshot(vehicle, &snapshot, Utc::now());
                    report.points_written += points.len();
                    self.sink.write_points(points);
                }
            }
            report.vehicles_polled += 1;
        }

        Ok(())
    }

    fn complete_cycle(&mut self, outcome: &Result<CycleReport>) {
        match outcome {
            Ok(report) => {
                self.retries = 0;
                debug!(
                    polled = report.vehicles_polled,
                    unavailable = report.vehicles_unavailable,
                    points = report.points_written,
                    "Collection finished"
                );
            }
            Err(err) => {
                self.retries = self.retries.saturating_add(1);
                error!(
                    kind = err.kind(),
                    retries = self.retries,
                    "Failed getting data: {:?}",
                    err
                );
            }
        }
    }

    fn next_wait(&self, elapsed: Duration) -> Duration {
        let offset = jitter_offset(self.polling.jitter, &mut rand::thread_rng());
        pacing_delay(self.polling.interval, elapsed, offset)
    }
}

/// Returns `false` when cancelled before the sleep finished
async fn sleep_or_cancel(duration: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
