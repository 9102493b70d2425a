//! Stepsense - On-device step classification engine for 6-axis inertial telemetry
//!
//! Stepsense turns a stream of accelerometer/gyroscope samples into discrete
//! step classifications (walk, run, hop) through a deterministic pipeline:
//! record decoding → history buffering → peak detection → window
//! classification → stream annotation.
//!
//! ## Modules
//!
//! - **Core**: history buffer, step detector and peak classifier
//! - **Adapters**: telemetry CSV codec and the stream annotation pipeline

pub mod classifier;
pub mod detector;
pub mod error;
pub mod history;
pub mod pipeline;
pub mod telemetry;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use detector::{DetectorConfig, DetectorSnapshot, DetectorState, StepDetector};
pub use error::ClassifyError;
pub use pipeline::{AnnotateSummary, TelemetryAnnotator};
pub use telemetry::RecordFormat;
pub use types::{SensorRecord, StepKind};

/// Stepsense version embedded in summaries and the FFI version string
pub const STEPSENSE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name stamped on summaries
pub const PRODUCER_NAME: &str = "stepsense";
