use std::fmt;

use tracing::{debug, warn};

use crate::error::{Error, Result};

use super::duty::{DutyMode, DutyPoint};
use super::types::{OutputSink, OutputSpec, OutputState};

/// Slack (kW) within which a request still counts as reaching a power level.
///
/// Grants are subtracted from a shared `f32` budget, so the share left for a
/// later output can land a few ulps below what it needs.
pub fn power_tolerance_kw(max_kw: f32) -> f32 {
    1e-4 * max_kw.max(1.0)
}

/// An administrative or manual command addressed to one output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `on` forces full power, `off` closes.
    Toggle(bool),
    /// `on` enables, `off` disables.
    Enabled(bool),
}

impl Command {
    /// Parses a `(cmd, value)` pair; the value is matched case-insensitively.
    ///
    /// Returns `None` for any unrecognised combination.
    pub fn parse(cmd: &str, value: &str) -> Option<Self> {
        let on = if value.trim().eq_ignore_ascii_case("on") {
            true
        } else if value.trim().eq_ignore_ascii_case("off") {
            false
        } else {
            return None;
        };
        match cmd {
            "toggle" => Some(Self::Toggle(on)),
            "enabled" => Some(Self::Enabled(on)),
            _ => None,
        }
    }
}

/// A controllable load: a switch or a duty-cycle-modulated device.
///
/// Owns its actuation state and its power/duty mapping. State only changes
/// through the methods below, and every change is reported to the injected
/// [`OutputSink`].
///
/// Invariants: `0 <= power_kw <= max_kw`, `0 <= duty <= 100`, and a disabled
/// output always sits at zero power and zero duty.
pub struct Output {
    spec: OutputSpec,
    power_kw: f32,
    duty: u8,
    is_open: bool,
    enabled: bool,
    sink: Box<dyn OutputSink>,
}

impl Output {
    /// Creates a closed, enabled output.
    ///
    /// # Panics
    ///
    /// Panics if `spec.max_kw` is negative or not finite.
    pub fn new(spec: OutputSpec, sink: impl OutputSink + 'static) -> Self {
        assert!(spec.max_kw.is_finite() && spec.max_kw >= 0.0);

        Self {
            spec,
            power_kw: 0.0,
            duty: 0,
            is_open: false,
            enabled: true,
            sink: Box::new(sink),
        }
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn priority(&self) -> i32 {
        self.spec.priority
    }

    pub fn max_kw(&self) -> f32 {
        self.spec.max_kw
    }

    /// Last commanded power (kW).
    pub fn power_kw(&self) -> f32 {
        self.power_kw
    }

    /// Last commanded duty level (0..=100).
    pub fn duty(&self) -> u8 {
        self.duty
    }

    pub fn duty_mode(&self) -> &DutyMode {
        &self.spec.duty
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn state(&self) -> OutputState {
        if !self.enabled {
            OutputState::Disabled
        } else if self.is_open && self.duty > 0 {
            OutputState::Open(self.duty)
        } else {
            OutputState::Closed
        }
    }

    /// Marks the output as actuated without touching its power or duty level.
    ///
    /// Emits `on_open` only on the closed-to-open transition.
    pub fn open(&mut self) {
        if !self.enabled || self.is_open {
            return;
        }
        self.is_open = true;
        self.sink.on_open(&self.spec.id);
    }

    /// Forces full power and 100% duty.
    pub fn open_full(&mut self) {
        if !self.enabled {
            return;
        }
        self.power_kw = self.spec.max_kw;
        self.duty = 100;
        self.open();
        self.sink.on_duty_changed(&self.spec.id, 100);
    }

    /// Forces zero power and zero duty.
    ///
    /// Not guarded: closing a closed output re-emits `on_duty_changed(0)`
    /// followed by `on_close`.
    pub fn close(&mut self) {
        self.is_open = false;
        self.power_kw = 0.0;
        self.duty = 0;
        self.sink.on_duty_changed(&self.spec.id, 0);
        self.sink.on_close(&self.spec.id);
    }

    /// Administratively enables the output and announces its current level.
    pub fn enable(&mut self) {
        self.enabled = true;
        self.sink.on_enabled(&self.spec.id, true);
        self.sink.on_duty_changed(&self.spec.id, self.duty);
    }

    /// Administratively disables the output, closing it first.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.close();
        self.sink.on_enabled(&self.spec.id, false);
    }

    /// Re-announces the administrative state without changing anything.
    pub fn announce_enabled(&mut self) {
        self.sink.on_enabled(&self.spec.id, self.enabled);
    }

    /// Commands the output to draw up to `requested_kw` and returns the power
    /// it actually draws.
    ///
    /// Binary outputs accept only full power; duty outputs scale linearly or
    /// snap down to the nearest curve point that does not exceed the request.
    /// A disabled output ignores the call and returns `0.0`.
    pub fn set_power(&mut self, requested_kw: f32) -> f32 {
        if !self.enabled {
            return 0.0;
        }

        let max_kw = self.spec.max_kw;
        let reaches_max = requested_kw + power_tolerance_kw(max_kw) >= max_kw;
        let binary = !self.spec.duty.is_duty_enabled();
        if requested_kw.is_nan() || requested_kw <= 0.0 || (binary && !reaches_max) {
            self.close();
            return 0.0;
        }

        if reaches_max {
            self.open_full();
            return max_kw;
        }

        let (duty, power_kw) = match self.power_to_duty(requested_kw) {
            Ok(mapped) => mapped,
            Err(e) => {
                warn!(output = %self.spec.id, error = %e, "cannot map power to duty");
                self.close();
                return 0.0;
            }
        };
        debug!(output = %self.spec.id, requested_kw, duty, power_kw, "power to duty");

        self.apply(duty, power_kw);
        self.power_kw
    }

    /// Commands a duty level and returns the level actually applied.
    ///
    /// Curve outputs snap down to the nearest measured level. Binary outputs
    /// treat any positive level as full power.
    pub fn set_duty(&mut self, level: i32) -> u8 {
        if !self.enabled {
            return 0;
        }
        if level <= 0 {
            self.close();
            return 0;
        }
        if level >= 100 || !self.spec.duty.is_duty_enabled() {
            self.open_full();
            return 100;
        }

        let level = level as u8;
        let (duty, power_kw) = match self.duty_to_power(level) {
            Ok(mapped) => mapped,
            Err(e) => {
                warn!(output = %self.spec.id, error = %e, "cannot map duty to power");
                self.close();
                return 0;
            }
        };
        debug!(output = %self.spec.id, level, duty, power_kw, "duty to power");

        self.apply(duty, power_kw);
        self.duty
    }

    /// Executes a manual command; returns `false` if it is not recognised.
    pub fn process_cmd(&mut self, cmd: &str, value: &str) -> bool {
        debug!(output = %self.spec.id, cmd, value, "command");
        match Command::parse(cmd, value) {
            Some(command) => {
                self.execute(command);
                true
            }
            None => false,
        }
    }

    pub fn execute(&mut self, command: Command) {
        match command {
            Command::Toggle(true) => self.open_full(),
            Command::Toggle(false) => self.close(),
            Command::Enabled(true) => self.enable(),
            Command::Enabled(false) => self.disable(),
        }
    }

    /// Looks up the curve point for `power_kw`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoDutyCurve`] when the output is not curve-driven.
    pub fn curve_point_by_power(&self, power_kw: f32) -> Result<Option<DutyPoint>> {
        self.curve()
            .map(|c| c.point_by_power(power_kw))
    }

    /// Looks up the curve point for a duty level.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoDutyCurve`] when the output is not curve-driven.
    pub fn curve_point_by_level(&self, level: u8) -> Result<Option<DutyPoint>> {
        self.curve().map(|c| c.point_by_level(level))
    }

    /// `(duty, power)` for a request strictly between zero and `max_kw`.
    fn power_to_duty(&self, requested_kw: f32) -> Result<(u8, f32)> {
        let max_kw = self.spec.max_kw;
        if self.spec.duty == DutyMode::Linear {
            let duty = (requested_kw * 100.0 / max_kw).round().clamp(0.0, 100.0) as u8;
            return Ok((duty, requested_kw));
        }
        let point = self.curve_point_by_power(requested_kw + power_tolerance_kw(max_kw))?;
        Ok(point.map_or((0, 0.0), |p| (p.level, p.power_kw)))
    }

    /// `(duty, power)` for a level strictly between 0 and 100.
    fn duty_to_power(&self, level: u8) -> Result<(u8, f32)> {
        if self.spec.duty == DutyMode::Linear {
            return Ok((level, self.spec.max_kw * f32::from(level) / 100.0));
        }
        let point = self.curve_point_by_level(level)?;
        Ok(point.map_or((0, 0.0), |p| (p.level, p.power_kw)))
    }

    fn curve(&self) -> Result<&super::DutyCurve> {
        self.spec.duty.curve().ok_or_else(|| Error::NoDutyCurve {
            id: self.spec.id.clone(),
        })
    }

    fn apply(&mut self, duty: u8, power_kw: f32) {
        if duty == 0 {
            self.close();
            return;
        }
        self.open();
        self.power_kw = power_kw.clamp(0.0, self.spec.max_kw);
        self.duty = duty.min(100);
        self.sink.on_duty_changed(&self.spec.id, self.duty);
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output")
            .field("spec", &self.spec)
            .field("power_kw", &self.power_kw)
            .field("duty", &self.duty)
            .field("is_open", &self.is_open)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}
