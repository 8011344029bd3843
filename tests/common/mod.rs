//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use wattmgr::bus::{MemoryBus, OutboxReceiver, Topics, outbox, pump};
use wattmgr::control::{Allocator, ManualClock, Timing};
use wattmgr::devices::{DutyCurve, OutputSpec};

/// Client id every fixture allocator is rooted at.
pub const CLIENT: &str = "wm";

/// Measured curve of a 2.5 kW boiler.
pub fn boiler_curve() -> DutyCurve {
    DutyCurve::new([(0, 0.0), (50, 2.162), (100, 2.5)])
}

/// Allocator driven by a manual clock, wired to an in-memory bus.
pub struct Rig {
    pub allocator: Allocator<ManualClock>,
    pub outbox: OutboxReceiver,
    pub bus: MemoryBus,
    pub clock: ManualClock,
}

impl Rig {
    /// Builds a stopped allocator with default timing and the given outputs.
    pub fn new(outputs: impl IntoIterator<Item = OutputSpec>) -> Self {
        Self::with_timing(Timing::default(), outputs)
    }

    pub fn with_timing(timing: Timing, outputs: impl IntoIterator<Item = OutputSpec>) -> Self {
        let (tx, rx) = outbox();
        let clock = ManualClock::new();
        let mut allocator = Allocator::new(Topics::new(CLIENT), timing, tx, clock.clone());
        for spec in outputs {
            allocator.add_output(spec);
        }
        Self {
            allocator,
            outbox: rx,
            bus: MemoryBus::new(),
            clock,
        }
    }

    /// Starts the allocator and flushes everything it queued.
    pub fn started(mut self) -> Self {
        self.allocator.start();
        self.pump();
        self
    }

    /// Forwards pending requests; returns whether a disconnect went through.
    pub fn pump(&mut self) -> bool {
        match pump(&mut self.outbox, &mut self.bus) {
            Ok(disconnected) => disconnected,
            Err(e) => panic!("bus rejected request: {e}"),
        }
    }

    /// Delivers an inbound message as the bus would, then pumps.
    pub fn deliver(&mut self, topic: &str, payload: &str) {
        self.allocator.handle_message(topic, payload);
        self.pump();
    }

    /// Advances the clock past the optimize throttle.
    pub fn skip_throttle(&self) {
        self.clock.advance_ms(self.allocator.timing().optimize_interval_ms);
    }

    pub fn power(&self, id: &str) -> f32 {
        self.allocator
            .output(id)
            .map(|o| o.power_kw())
            .unwrap_or_else(|| panic!("no output {id}"))
    }

    pub fn duty(&self, id: &str) -> u8 {
        self.allocator
            .output(id)
            .map(|o| o.duty())
            .unwrap_or_else(|| panic!("no output {id}"))
    }
}

/// `wm/output/{id}` suffixed with `rest` (empty for the state topic).
pub fn output_topic(id: &str, rest: &str) -> String {
    if rest.is_empty() {
        format!("{CLIENT}/output/{id}")
    } else {
        format!("{CLIENT}/output/{id}/{rest}")
    }
}
