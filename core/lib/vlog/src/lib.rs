//! A set of logging macros that print not only timestamp and log level,
//! but also filename, line and column.
//!
//! They behave just like usual tracing::warn, tracing::info, etc.
//! For warn and error macros we are adding file line and column to the log line.

pub use tracing::{debug, info, trace};

#[doc(hidden)]
pub use tracing;

/// Initializes the logging subsystem with the `RUST_LOG` env-filter.
/// Must be called once at the start of every binary.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

#[macro_export]
macro_rules! warn {
    ($fmt:expr) => {
        $crate::tracing::warn!(concat!("[{}:{}:{}] ", $fmt), file!(), line!(), column!())
    };
    ($fmt:expr, $($args:tt)*) => {
        $crate::tracing::warn!(concat!("[{}:{}:{}] ", $fmt), file!(), line!(), column!(), $($args)*)
    };
}

#[macro_export]
macro_rules! error {
    ($fmt:expr) => {
        $crate::tracing::error!(concat!("[{}:{}:{}] ", $fmt), file!(), line!(), column!())
    };
    ($fmt:expr, $($args:tt)*) => {
        $crate::tracing::error!(concat!("[{}:{}:{}] ", $fmt), file!(), line!(), column!(), $($args)*)
    };
}
