use crate::devices::OutputSink;

use super::{Outbox, OutputTopics};

/// Publishes output notifications on the output's topics.
#[derive(Debug, Clone)]
pub struct OutboundSink {
    topics: OutputTopics,
    outbox: Outbox,
}

impl OutboundSink {
    pub fn new(topics: OutputTopics, outbox: Outbox) -> Self {
        Self { topics, outbox }
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

impl OutputSink for OutboundSink {
    fn on_open(&mut self, _id: &str) {
        self.outbox.publish(&self.topics.state, "on");
    }

    fn on_close(&mut self, _id: &str) {
        self.outbox.publish(&self.topics.state, "off");
    }

    fn on_duty_changed(&mut self, _id: &str, level: u8) {
        self.outbox.publish(&self.topics.dc, level.to_string());
        if let Some(topic) = &self.topics.extra_dc {
            self.outbox.publish(topic, level.to_string());
        }
    }

    fn on_enabled(&mut self, _id: &str, enabled: bool) {
        self.outbox.publish(&self.topics.enabled, on_off(enabled));
        if let Some(topic) = &self.topics.extra_status {
            self.outbox.publish(topic, on_off(enabled));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{Topics, outbox};
    use crate::devices::{Output, OutputSpec};

    #[test]
    fn notifications_become_publishes() {
        let (tx, mut rx) = outbox();
        let topics = Topics::new("wm")
            .for_output("pump")
            .with_extra(Some("house/pump/status".into()), None);
        let mut o = Output::new(OutputSpec::binary("pump", 1, 1.0), OutboundSink::new(topics, tx));

        o.open_full();
        o.disable();

        let sent: Vec<(String, String)> = rx
            .drain_publishes()
            .into_iter()
            .map(|p| (p.topic, p.payload))
            .collect();
        assert_eq!(
            sent,
            vec![
                ("wm/output/pump".into(), "on".into()),
                ("wm/output/pump/dc".into(), "100".into()),
                ("wm/output/pump/dc".into(), "0".into()),
                ("wm/output/pump".into(), "off".into()),
                ("wm/output/pump/enabled".into(), "off".into()),
                ("house/pump/status".into(), "off".into()),
            ]
        );
    }
}
