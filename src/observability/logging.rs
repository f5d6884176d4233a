//! # Structured Logging
//!
//! Subscriber setup and span macros for harness operations.

use crate::config::LoggingConfig;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Create a tracing span for a harness operation.
///
/// ```rust,ignore
/// let span = harness_span!("provision", run.id());
/// let span = harness_span!("load_fixture", run.id(), path = %path.display());
/// ```
#[macro_export]
macro_rules! harness_span {
    ($operation:expr, $test_id:expr) => {
        tracing::debug_span!(
            "harness_operation",
            operation = %$operation,
            test_id = %$test_id,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($operation:expr, $test_id:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "harness_operation",
            operation = %$operation,
            test_id = %$test_id,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Install the global fmt subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Returns `false`
/// when a subscriber was already installed, which is normal inside test
/// binaries where several tests initialise logging.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = FmtSubscriber::builder().with_env_filter(filter);

    let installed = if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.with_test_writer().finish())
    };

    installed.is_ok()
}
