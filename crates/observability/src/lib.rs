//! Process-wide tracing setup shared by binaries and test harnesses.

pub mod tracing;

pub use crate::tracing::{LogFormat, LoggingConfig};

/// Initialize tracing with the default configuration (JSON, `info`).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(&LoggingConfig::default());
}
