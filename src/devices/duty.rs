//! Duty-cycle modes and the measured duty curve.

/// One measured point of a duty curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DutyPoint {
    /// Duty level (0..=100).
    pub level: u8,
    /// Power drawn at this level (kW).
    pub power_kw: f32,
}

impl DutyPoint {
    pub fn new(level: u8, power_kw: f32) -> Self {
        Self { level, power_kw }
    }
}

/// Empirical mapping from duty level to power draw, ascending by level.
///
/// Power is assumed non-decreasing as the level increases. The curve trusts
/// its caller on that; configuration only checks level ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DutyCurve {
    points: Vec<DutyPoint>,
}

impl DutyCurve {
    /// Builds a curve from `(level, power_kw)` pairs, keeping their order.
    pub fn new(points: impl IntoIterator<Item = (u8, f32)>) -> Self {
        Self {
            points: points
                .into_iter()
                .map(|(level, power_kw)| DutyPoint::new(level, power_kw))
                .collect(),
        }
    }

    pub fn points(&self) -> &[DutyPoint] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns the last point whose power does not exceed `power_kw`.
    ///
    /// Scans in ascending order and stops at the first point above the
    /// request, so the result never overshoots. `None` when even the first
    /// point draws more than requested.
    pub fn point_by_power(&self, power_kw: f32) -> Option<DutyPoint> {
        self.points
            .iter()
            .take_while(|p| p.power_kw <= power_kw)
            .last()
            .copied()
    }

    /// Returns the last point whose level does not exceed `level`.
    pub fn point_by_level(&self, level: u8) -> Option<DutyPoint> {
        self.points
            .iter()
            .take_while(|p| p.level <= level)
            .last()
            .copied()
    }
}

/// How an output converts requested power into actuation.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DutyMode {
    /// Full power or nothing.
    #[default]
    Binary,
    /// Duty level proportional to power.
    Linear,
    /// Duty level looked up on a measured curve.
    Curve(DutyCurve),
}

impl DutyMode {
    /// Resolves the mode from configuration flags.
    ///
    /// A duty curve implies duty control unless explicitly disabled; an
    /// empty curve with duty control enabled means linear.
    pub fn from_config(duty_enabled: Option<bool>, curve: Option<DutyCurve>) -> Self {
        let curve = curve.filter(|c| !c.is_empty());
        let enabled = duty_enabled.unwrap_or(curve.is_some());
        match (enabled, curve) {
            (false, _) => Self::Binary,
            (true, Some(curve)) => Self::Curve(curve),
            (true, None) => Self::Linear,
        }
    }

    pub fn is_duty_enabled(&self) -> bool {
        !matches!(self, Self::Binary)
    }

    pub fn curve(&self) -> Option<&DutyCurve> {
        match self {
            Self::Curve(c) => Some(c),
            _ => None,
        }
    }
}
