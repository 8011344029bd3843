//! Greedy distribution of available power across prioritized outputs.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::bus::{OutboundSink, Outbox, OutputTopics, Topics};
use crate::config::WattConfig;
use crate::devices::{Output, OutputSpec};

use super::clock::{Clock, SystemClock};
use super::heartbeat::{CancelToken, Heartbeat};
use super::report::{Allocation, PassReport};

/// Timing parameters of the allocator, all in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    /// Minimum time between two optimization passes.
    pub optimize_interval_ms: u64,
    /// Minimum time between two available-vs-consumed reports.
    pub report_interval_ms: u64,
    /// Minimum time between two liveness announcements.
    pub alive_interval_ms: u64,
    /// Period at which the driver calls [`Allocator::tick`].
    pub tick_ms: u64,
    /// Delay between closing everything on stop and disconnecting.
    pub stop_grace_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            optimize_interval_ms: 15_000,
            report_interval_ms: 60_000,
            alive_interval_ms: 30 * 60 * 1000,
            tick_ms: 5_000,
            stop_grace_ms: 1_000,
        }
    }
}

/// Outcome of routing one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// No route for the topic.
    Unrouted,
    /// Available-power reading; carries the pass report if a pass ran.
    Power(Option<PassReport>),
    /// Per-output command; `handled` is false for unrecognised values.
    Command { handled: bool },
}

impl Dispatch {
    pub fn is_handled(&self) -> bool {
        match self {
            Self::Unrouted => false,
            Self::Power(_) => true,
            Self::Command { handled } => *handled,
        }
    }
}

/// Outcome of one heartbeat tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Nothing was due.
    Idle,
    /// The liveness announcement was published.
    Alive,
    /// Shutdown completed; the driver should stop ticking.
    Stopped,
}

#[derive(Debug, Clone)]
enum Route {
    Power,
    Command { output: String, cmd: &'static str },
}

/// Owns the outputs and distributes available power among them.
///
/// Outputs are kept sorted by ascending priority (stable for ties). Every
/// output notification is published through the shared [`Outbox`]; the
/// allocator itself never blocks.
#[derive(Debug)]
pub struct Allocator<K: Clock = SystemClock> {
    outputs: Vec<Output>,
    max_output_kw: f32,
    timing: Timing,
    topics: Topics,
    power_topics: Vec<String>,
    routes: HashMap<String, Route>,
    outbox: Outbox,
    clock: K,
    heartbeat: Heartbeat,
    last_optimize_at: Option<u64>,
    last_report_at: Option<u64>,
    running: bool,
    stopping_since: Option<u64>,
}

impl<K: Clock> Allocator<K> {
    /// Creates an allocator with no outputs, listening on `C/input`.
    pub fn new(topics: Topics, timing: Timing, outbox: Outbox, clock: K) -> Self {
        let mut allocator = Self {
            outputs: Vec::new(),
            max_output_kw: 0.0,
            heartbeat: Heartbeat::new(timing.alive_interval_ms),
            timing,
            power_topics: Vec::new(),
            routes: HashMap::new(),
            topics,
            outbox,
            clock,
            last_optimize_at: None,
            last_report_at: None,
            running: false,
            stopping_since: None,
        };
        allocator.add_power_topic(allocator.topics.input());
        allocator
    }

    /// Builds an allocator and its outputs from configuration.
    pub fn from_config(config: &WattConfig, outbox: Outbox, clock: K) -> Self {
        let mut allocator = Self::new(
            Topics::new(config.mqtt.client_id.as_str()),
            config.timing(),
            outbox,
            clock,
        );
        if let Some(topic) = &config.mqtt.power_topic {
            allocator.add_power_topic(topic.clone());
        }
        for o in &config.outputs {
            info!(id = %o.id, priority = o.priority, power = o.power, "creating output");
            let topics = allocator
                .topics
                .for_output(&o.id)
                .with_extra(o.status_topic.clone(), o.dc_topic.clone());
            allocator.add_output_with_topics(o.to_spec(), topics);
        }
        allocator
    }

    /// Adds another topic on which available-power readings are accepted.
    pub fn add_power_topic(&mut self, topic: impl Into<String>) {
        let topic = topic.into();
        if self.routes.contains_key(&topic) {
            return;
        }
        if self.running {
            self.outbox.subscribe(topic.as_str());
        }
        self.routes.insert(topic.clone(), Route::Power);
        self.power_topics.push(topic);
    }

    /// Adds an output published on its default topics.
    pub fn add_output(&mut self, spec: OutputSpec) {
        let topics = self.topics.for_output(&spec.id);
        self.add_output_with_topics(spec, topics);
    }

    /// Adds an output, wires its notifications to `topics` and re-sorts.
    pub fn add_output_with_topics(&mut self, spec: OutputSpec, topics: OutputTopics) {
        for (topic, cmd) in topics.command_routes() {
            if self.running {
                self.outbox.subscribe(topic);
            }
            self.routes.insert(
                topic.to_string(),
                Route::Command {
                    output: spec.id.clone(),
                    cmd,
                },
            );
        }

        self.max_output_kw += spec.max_kw;
        let sink = OutboundSink::new(topics, self.outbox.clone());
        self.outputs.push(Output::new(spec, sink));
        // Stable: ties keep insertion order.
        self.outputs.sort_by_key(Output::priority);
    }

    /// Subscribes, announces presence and drives every output to a known
    /// closed baseline. Safe to call again after a reconnect.
    pub fn start(&mut self) {
        info!(outputs = self.outputs.len(), max_kw = self.max_output_kw, "starting allocator");
        for topic in self.subscriptions() {
            self.outbox.subscribe(topic);
        }
        self.running = true;
        self.stopping_since = None;
        self.outbox.publish_retained(self.topics.status(), "ON");
        for o in &mut self.outputs {
            o.enable();
            o.close();
        }
        self.heartbeat.restart();
    }

    /// Closes every output and announces going offline.
    ///
    /// The disconnect itself happens on the first [`tick`](Self::tick) after
    /// the grace delay, so the final close messages are flushed first.
    pub fn stop(&mut self) {
        if !self.running || self.stopping_since.is_some() {
            return;
        }
        info!("stopping allocator");
        for o in &mut self.outputs {
            o.close();
        }
        self.outbox.publish_retained(self.topics.status(), "OFF");
        self.stopping_since = Some(self.clock.now_ms());
    }

    /// Periodic housekeeping: liveness announcements and shutdown completion.
    pub fn tick(&mut self) -> Tick {
        let now = self.clock.now_ms();

        if let Some(since) = self.stopping_since {
            if now.saturating_sub(since) < self.timing.stop_grace_ms {
                return Tick::Idle;
            }
            info!("allocator stopped");
            self.outbox.disconnect();
            self.running = false;
            self.stopping_since = None;
            self.heartbeat.cancel();
            return Tick::Stopped;
        }

        if self.heartbeat.token().is_cancelled() {
            return Tick::Stopped;
        }
        if !self.running || !self.heartbeat.check(now) {
            return Tick::Idle;
        }

        let stamp = self
            .clock
            .utc_now()
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        info!(at = %stamp, "alive");
        self.outbox.publish_retained(self.topics.alive(), stamp);
        self.outbox.publish_retained(self.topics.status(), "ON");
        for o in &mut self.outputs {
            o.announce_enabled();
        }
        Tick::Alive
    }

    /// Routes one inbound message.
    ///
    /// Unparseable power readings are logged and dropped. Output commands are
    /// dropped unless running, so nothing reopens during shutdown.
    pub fn handle_message(&mut self, topic: &str, payload: &str) -> Dispatch {
        match self.routes.get(topic).cloned() {
            Some(Route::Power) => match payload.trim().parse::<f32>() {
                Ok(value) if value.is_finite() => Dispatch::Power(self.handle_available_power(value)),
                _ => {
                    warn!(topic, payload, "ignoring non-numeric power reading");
                    Dispatch::Power(None)
                }
            },
            Some(Route::Command { .. }) if !self.running || self.stopping_since.is_some() => {
                warn!(topic, payload, "not running, dropping command");
                Dispatch::Command { handled: false }
            }
            Some(Route::Command { output, cmd }) => {
                let value = payload.trim().to_lowercase();
                let handled = self
                    .output_mut(&output)
                    .is_some_and(|o| o.process_cmd(cmd, &value));
                if !handled {
                    warn!(topic, payload, "command not handled");
                }
                Dispatch::Command { handled }
            }
            None => {
                warn!(topic, payload, "message not handled");
                Dispatch::Unrouted
            }
        }
    }

    /// Re-distributes power given a new available-power reading (kW).
    ///
    /// Skipped (returns `None`) when the reading is zero, when the allocator
    /// is not running, or when the previous pass is younger than the
    /// optimize interval. Otherwise every output is revisited in priority
    /// order against the pool `current total output + value`; each takes
    /// what it can from what is left, with no backtracking.
    pub fn handle_available_power(&mut self, value: f32) -> Option<PassReport> {
        let now = self.clock.now_ms();
        if value == 0.0 || value.is_nan() {
            debug!(value, "no power change, skipping");
            return None;
        }
        if !self.running || self.stopping_since.is_some() {
            debug!(value, "not running, skipping");
            return None;
        }
        if self
            .last_optimize_at
            .is_some_and(|last| now.saturating_sub(last) < self.timing.optimize_interval_ms)
        {
            debug!(value, "optimize throttled");
            return None;
        }
        self.last_optimize_at = Some(now);

        let current_kw = self.total_output_kw();
        let budget_kw = current_kw + value;
        debug!(current_kw, available_kw = value, budget_kw, "optimizing output power");

        let mut remaining_kw = budget_kw;
        let mut allocations = Vec::with_capacity(self.outputs.len());
        for o in &mut self.outputs {
            let granted_kw = o.set_power(remaining_kw);
            remaining_kw -= granted_kw;
            debug!(
                output = o.id(),
                enabled = o.is_enabled(),
                power_kw = o.power_kw(),
                remaining_kw,
                "allocated"
            );
            allocations.push(Allocation {
                output_id: o.id().to_string(),
                priority: o.priority(),
                power_kw: granted_kw,
                duty: o.duty(),
                enabled: o.is_enabled(),
                remaining_kw,
            });
        }

        let total_kw = self.total_output_kw();
        self.outbox.publish(self.topics.output(), total_kw.to_string());

        let report_due = self
            .last_report_at
            .is_none_or(|last| now.saturating_sub(last) >= self.timing.report_interval_ms);
        if report_due {
            info!(
                available_kw = value,
                consumed_kw = total_kw,
                max_kw = self.max_output_kw,
                "power report"
            );
            self.last_report_at = Some(now);
        }

        Some(PassReport {
            at_ms: now,
            available_kw: value,
            budget_kw,
            total_kw,
            allocations,
        })
    }

    /// Sum of the power currently commanded on every output (kW).
    pub fn total_output_kw(&self) -> f32 {
        self.outputs.iter().map(Output::power_kw).sum()
    }

    /// Sum of every output's maximum power (kW).
    pub fn max_output_kw(&self) -> f32 {
        self.max_output_kw
    }

    /// Outputs in service order.
    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn output(&self, id: &str) -> Option<&Output> {
        self.outputs.iter().find(|o| o.id() == id)
    }

    pub fn output_mut(&mut self, id: &str) -> Option<&mut Output> {
        self.outputs.iter_mut().find(|o| o.id() == id)
    }

    /// Every inbound topic the allocator listens on.
    pub fn subscriptions(&self) -> Vec<String> {
        let mut topics = self.power_topics.clone();
        let mut commands: Vec<String> = self
            .routes
            .iter()
            .filter(|(_, r)| matches!(r, Route::Command { .. }))
            .map(|(t, _)| t.clone())
            .collect();
        commands.sort();
        topics.extend(commands);
        topics
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping_since.is_some()
    }

    /// Token cancelled once shutdown has completed.
    pub fn cancel_token(&self) -> CancelToken {
        self.heartbeat.token()
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusRequest, OutboxReceiver, outbox};
    use crate::control::clock::ManualClock;
    use crate::devices::OutputState;

    fn allocator() -> (Allocator<ManualClock>, OutboxReceiver, ManualClock) {
        let (tx, rx) = outbox();
        let clock = ManualClock::new();
        let a = Allocator::new(Topics::new("wm"), Timing::default(), tx, clock.clone());
        (a, rx, clock)
    }

    #[test]
    fn outputs_sorted_by_priority_stable() {
        let (mut a, _rx, _) = allocator();
        a.add_output(OutputSpec::binary("c", 2, 1.0));
        a.add_output(OutputSpec::binary("a", 1, 1.0));
        a.add_output(OutputSpec::binary("d", 2, 1.0));
        a.add_output(OutputSpec::binary("b", 1, 0.5));

        let ids: Vec<&str> = a.outputs().iter().map(Output::id).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
        assert!((a.max_output_kw() - 3.5).abs() < 1e-6);
    }

    #[test]
    fn two_binary_outputs_greedy() {
        let (mut a, mut rx, _) = allocator();
        a.add_output(OutputSpec::binary("first", 1, 1.0));
        a.add_output(OutputSpec::binary("second", 2, 1.5));
        a.start();
        rx.drain();

        let report = a.handle_available_power(1.2).expect("pass should run");
        assert_eq!(a.output("first").map(Output::power_kw), Some(1.0));
        assert_eq!(a.output("second").map(Output::state), Some(OutputState::Closed));
        assert_eq!(report.total_kw, 1.0);
        assert!((report.unallocated_kw() - 0.2).abs() < 1e-6);

        let last_total = rx
            .drain_publishes()
            .into_iter()
            .filter(|p| p.topic == "wm/output")
            .map(|p| p.payload)
            .last();
        assert_eq!(last_total.as_deref(), Some("1"));
    }

    #[test]
    fn throttle_and_zero_skip() {
        let (mut a, _rx, clock) = allocator();
        a.add_output(OutputSpec::linear("h", 1, 2.0));
        a.start();

        assert!(a.handle_available_power(0.0).is_none());
        assert!(a.handle_available_power(1.0).is_some());
        clock.advance_ms(14_999);
        assert!(a.handle_available_power(0.5).is_none());
        assert_eq!(a.output("h").map(Output::power_kw), Some(1.0));

        clock.advance_ms(1);
        assert!(a.handle_available_power(0.5).is_some());
        assert_eq!(a.output("h").map(Output::power_kw), Some(1.5));
    }

    #[test]
    fn ignores_power_until_started() {
        let (mut a, _rx, _) = allocator();
        a.add_output(OutputSpec::binary("p", 1, 1.0));
        assert!(a.handle_available_power(5.0).is_none());
        assert_eq!(a.total_output_kw(), 0.0);
    }

    #[test]
    fn start_subscribes_and_baselines() {
        let (mut a, mut rx, _) = allocator();
        a.add_output(OutputSpec::binary("p", 1, 1.0));
        a.start();

        let requests = rx.drain();
        assert_eq!(requests.first(), Some(&BusRequest::Subscribe("wm/input".into())));
        assert!(requests.contains(&BusRequest::Subscribe("wm/output/p/set".into())));
        assert!(requests.contains(&BusRequest::Subscribe("wm/output/p/status/set".into())));
        assert!(a.is_running());
        assert_eq!(a.output("p").map(Output::state), Some(OutputState::Closed));
    }

    #[test]
    fn non_numeric_power_is_swallowed() {
        let (mut a, _rx, _) = allocator();
        a.add_output(OutputSpec::binary("p", 1, 1.0));
        a.start();

        assert_eq!(a.handle_message("wm/input", "n/a"), Dispatch::Power(None));
        assert_eq!(a.handle_message("wm/input", "inf"), Dispatch::Power(None));
        assert_eq!(a.total_output_kw(), 0.0);
        assert!(matches!(a.handle_message("wm/input", " 3.0 "), Dispatch::Power(Some(_))));
        assert_eq!(a.total_output_kw(), 1.0);
    }

    #[test]
    fn stop_waits_for_grace_then_disconnects() {
        let (mut a, mut rx, clock) = allocator();
        a.add_output(OutputSpec::binary("p", 1, 1.0));
        a.start();
        a.handle_available_power(2.0);
        rx.drain();

        a.stop();
        assert_eq!(a.total_output_kw(), 0.0);
        assert!(a.is_running());
        assert_eq!(a.tick(), Tick::Idle);
        let pending = rx.drain();
        assert!(!pending.contains(&BusRequest::Disconnect));
        assert_eq!(
            pending.last(),
            Some(&BusRequest::Publish(crate::bus::Publish {
                topic: "wm/status".into(),
                payload: "OFF".into(),
                retain: true,
            }))
        );

        assert_eq!(
            a.handle_message("wm/output/p/set", "on"),
            Dispatch::Command { handled: false }
        );
        assert_eq!(a.total_output_kw(), 0.0);

        clock.advance_ms(1_000);
        assert_eq!(a.tick(), Tick::Stopped);
        assert!(!a.is_running());
        assert!(a.cancel_token().is_cancelled());
        assert_eq!(rx.drain(), vec![BusRequest::Disconnect]);
    }
}
