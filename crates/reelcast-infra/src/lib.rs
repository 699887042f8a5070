//! Reelcast Infrastructure Library
//!
//! Shared process-level plumbing for the Reelcast binaries. Today that is tracing
//! initialisation: an `EnvFilter` driven by `RUST_LOG` and a human or JSON formatter.

#[cfg(feature = "observability-basic")]
pub mod telemetry;

// Re-export commonly used types
#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, shutdown_telemetry, LogFormat, TelemetryConfig};
