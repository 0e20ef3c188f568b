//! Error types for telemetry operations.

use prometheus::Error as PrometheusError;
use thiserror::Error;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised while installing logging or exporting the queue gauge.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global tracing subscriber was already installed.
    #[error("failed to install tracing subscriber")]
    SubscriberInstall {
        /// Underlying tracing subscriber error.
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
    /// The gauge options were rejected.
    #[error("failed to build metrics collector")]
    MetricsCollector {
        /// Metric name.
        name: &'static str,
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// The gauge could not be added to the registry.
    #[error("failed to register metrics collector")]
    MetricsRegister {
        /// Metric name.
        name: &'static str,
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// Text exposition encoding failed.
    #[error("failed to encode metrics")]
    MetricsEncode {
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// Encoded exposition was not UTF-8.
    #[error("metrics output was not valid utf-8")]
    MetricsUtf8 {
        /// Underlying conversion error.
        #[source]
        source: std::string::FromUtf8Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use tracing_subscriber::util::SubscriberInitExt;

    // Whichever call loses the race for the global default yields the error.
    fn second_install_error() -> Option<tracing_subscriber::util::TryInitError> {
        let first = tracing_subscriber::registry().try_init().err();
        first.or_else(|| tracing_subscriber::registry().try_init().err())
    }

    #[test]
    fn subscriber_install_wraps_the_init_error() {
        let source = second_install_error();
        assert!(source.is_some());
        if let Some(source) = source {
            let err = TelemetryError::SubscriberInstall { source };
            assert_eq!(err.to_string(), "failed to install tracing subscriber");
            assert!(err.source().is_some());
        }
    }

    #[test]
    fn metrics_errors_keep_the_gauge_name() {
        let err = TelemetryError::MetricsRegister {
            name: "sluice_queue_depth",
            source: PrometheusError::AlreadyReg,
        };
        assert_eq!(err.to_string(), "failed to register metrics collector");
        assert!(matches!(
            err,
            TelemetryError::MetricsRegister {
                name: "sluice_queue_depth",
                ..
            }
        ));
        assert!(err.source().is_some());
    }

    #[test]
    fn invalid_utf8_exposition_is_reported() {
        let Err(source) = String::from_utf8(vec![0xff, 0xfe]) else {
            panic!("bytes unexpectedly decoded");
        };
        let err = TelemetryError::MetricsUtf8 { source };
        assert_eq!(err.to_string(), "metrics output was not valid utf-8");
    }
}
