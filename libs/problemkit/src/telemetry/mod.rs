//! Logging setup for hosts that let the pipeline own the subscriber
//!
//! Hosts that already install a subscriber can ignore this module; the pipeline only emits
//! `tracing` events and never requires a particular subscriber.

pub mod config;
pub mod init;

pub use config::{LogFormat, LoggingConfig};
pub use init::{TelemetryError, build_filter, init_logging};
