//! A set of helpers for testing

mod transports;
mod weather;

pub use transports::{FailingEmailTransport, RecordingEmailTransport, RecordingPushTransport};
pub use weather::{AlertBuilder, ForecastBuilder, SnapshotBuilder, test_settings};
