/*!
# Collector DevKit - Fakes and fixtures for collector tests

Helpers for exercising the vehicle collector without real services:
- Fake telemetry API (token, vehicle list, vehicle data) over HTTP
- Fake InfluxDB write endpoint
- Mock metrics sink recording flushed batches
- Snapshot payload builders
*/

pub mod fake_api;
pub mod fixtures;
pub mod sink_stub;
pub mod test_utils;

pub use fake_api::{FakeInflux, FakeTeslaApi, VehicleReply, WriteRequest};
pub use fixtures::{vehicle_list, SnapshotBuilder};
pub use sink_stub::MockSink;
pub use test_utils::{polling, TestHarness};
