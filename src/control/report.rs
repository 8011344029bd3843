//! Records produced by an optimization pass.

use std::fmt;

/// What one output received during a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub output_id: String,
    pub priority: i32,
    /// Power actually granted (kW).
    pub power_kw: f32,
    pub duty: u8,
    pub enabled: bool,
    /// Budget left after this output was served (kW).
    pub remaining_kw: f32,
}

/// Complete record of one optimization pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    /// Clock reading when the pass ran (ms).
    pub at_ms: u64,
    /// Available power reported upstream (kW).
    pub available_kw: f32,
    /// Pool distributed in this pass: previous total output plus available.
    pub budget_kw: f32,
    /// Total output power after the pass (kW).
    pub total_kw: f32,
    /// One entry per output, in the order they were served.
    pub allocations: Vec<Allocation>,
}

impl PassReport {
    /// Budget that no output could use.
    pub fn unallocated_kw(&self) -> f32 {
        self.allocations
            .last()
            .map_or(self.budget_kw, |a| a.remaining_kw)
    }
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={:>8}ms | avail={:>7.3} kW  budget={:>7.3} kW  total={:>7.3} kW |",
            self.at_ms, self.available_kw, self.budget_kw, self.total_kw,
        )?;
        for a in &self.allocations {
            write!(f, " {}={:.3}({}%)", a.output_id, a.power_kw, a.duty)?;
            if !a.enabled {
                write!(f, "[off]")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lists_allocations() {
        let r = PassReport {
            at_ms: 15_000,
            available_kw: 1.2,
            budget_kw: 1.2,
            total_kw: 1.0,
            allocations: vec![
                Allocation {
                    output_id: "pump".into(),
                    priority: 1,
                    power_kw: 1.0,
                    duty: 100,
                    enabled: true,
                    remaining_kw: 0.2,
                },
                Allocation {
                    output_id: "heater".into(),
                    priority: 2,
                    power_kw: 0.0,
                    duty: 0,
                    enabled: false,
                    remaining_kw: 0.2,
                },
            ],
        };
        let s = format!("{r}");
        assert!(s.contains("pump=1.000(100%)"));
        assert!(s.contains("heater=0.000(0%)[off]"));
        assert!((r.unallocated_kw() - 0.2).abs() < 1e-6);
    }
}
