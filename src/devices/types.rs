//! Common types and traits for controllable outputs.

use std::sync::{Arc, Mutex};

/// Receiver of the notifications an [`Output`](super::Output) raises when its
/// state changes.
///
/// The output depends only on this capability; whoever constructs it decides
/// where the notifications go (bus publishes, logs, a test recorder).
pub trait OutputSink: Send {
    /// The output went from closed to open.
    fn on_open(&mut self, id: &str);

    /// The output was closed (always preceded by `on_duty_changed(id, 0)`).
    fn on_close(&mut self, id: &str);

    /// The commanded duty level changed (or is being re-announced).
    fn on_duty_changed(&mut self, id: &str, level: u8);

    /// The administrative enable state changed (or is being re-announced).
    fn on_enabled(&mut self, id: &str, enabled: bool);
}

/// A sink that drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn on_open(&mut self, _id: &str) {}
    fn on_close(&mut self, _id: &str) {}
    fn on_duty_changed(&mut self, _id: &str, _level: u8) {}
    fn on_enabled(&mut self, _id: &str, _enabled: bool) {}
}

/// One notification raised by an output, as captured by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    Open(String),
    Close(String),
    DutyChanged(String, u8),
    Enabled(String, bool),
}

/// Sink that records every notification in order.
///
/// Clones share the same log, so a test can keep one handle and give the
/// other to the output under test.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<OutputEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything recorded so far.
    pub fn events(&self) -> Vec<OutputEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Removes and returns everything recorded so far.
    pub fn take(&self) -> Vec<OutputEvent> {
        self.events
            .lock()
            .map(|mut e| std::mem::take(&mut *e))
            .unwrap_or_default()
    }

    fn push(&self, event: OutputEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl OutputSink for RecordingSink {
    fn on_open(&mut self, id: &str) {
        self.push(OutputEvent::Open(id.to_string()));
    }

    fn on_close(&mut self, id: &str) {
        self.push(OutputEvent::Close(id.to_string()));
    }

    fn on_duty_changed(&mut self, id: &str, level: u8) {
        self.push(OutputEvent::DutyChanged(id.to_string(), level));
    }

    fn on_enabled(&mut self, id: &str, enabled: bool) {
        self.push(OutputEvent::Enabled(id.to_string(), enabled));
    }
}

/// Observable state of an output.
///
/// `Open(0)` never occurs: a zero duty level always resolves to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputState {
    Disabled,
    Closed,
    Open(u8),
}

/// Static description of an output, built once from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSpec {
    pub id: String,
    /// Lower value is served first; not required to be unique.
    pub priority: i32,
    /// Upper bound of this output's draw (kW).
    pub max_kw: f32,
    pub duty: super::DutyMode,
}

impl OutputSpec {
    /// A binary (full power or off) output.
    pub fn binary(id: impl Into<String>, priority: i32, max_kw: f32) -> Self {
        Self {
            id: id.into(),
            priority,
            max_kw,
            duty: super::DutyMode::Binary,
        }
    }

    /// A duty-cycle output with a linear power/duty relationship.
    pub fn linear(id: impl Into<String>, priority: i32, max_kw: f32) -> Self {
        Self {
            id: id.into(),
            priority,
            max_kw,
            duty: super::DutyMode::Linear,
        }
    }

    /// A duty-cycle output driven by a measured duty curve.
    pub fn with_curve(
        id: impl Into<String>,
        priority: i32,
        max_kw: f32,
        curve: super::DutyCurve,
    ) -> Self {
        Self {
            id: id.into(),
            priority,
            max_kw,
            duty: super::DutyMode::Curve(curve),
        }
    }
}
