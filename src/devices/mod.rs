//! Controllable outputs and their power/duty mapping.

/// Duty modes and measured duty curves.
pub mod duty;
pub mod output;
pub mod types;

pub use duty::{DutyCurve, DutyMode, DutyPoint};
pub use output::{Command, Output, power_tolerance_kw};
pub use types::{NullSink, OutputEvent, OutputSink, OutputSpec, OutputState, RecordingSink};
