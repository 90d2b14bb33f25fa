#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Installs a global subscriber, so it lives in its own test binary.

use problemkit::telemetry::{LogFormat, LoggingConfig, TelemetryError, init_logging};

#[test]
fn second_initialization_is_rejected() {
    let cfg = LoggingConfig {
        level: "problemkit=debug".to_owned(),
        format: LogFormat::Json,
        ..LoggingConfig::default()
    };

    temp_env::with_var_unset("RUST_LOG", || {
        init_logging(&cfg, None).unwrap();
        let err = init_logging(&cfg, None).unwrap_err();
        assert!(matches!(err, TelemetryError::AlreadyInitialized(_)));
    });
}
