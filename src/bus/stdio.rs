use std::collections::BTreeSet;
use std::io::Write;

use tracing::{debug, warn};

use super::{Bus, BusError, Publish};

/// Line-oriented bridge: one message per line, `<topic> <payload>`.
///
/// Outbound messages are written to `writer`. Inbound lines are accepted
/// through [`StdioBus::accept`] and dropped unless their topic has been
/// subscribed, the way a broker would filter them. This makes the binary
/// usable behind any `topic payload` pipe (for example `mosquitto_sub -v`).
#[derive(Debug)]
pub struct StdioBus<W: Write> {
    writer: W,
    connected: bool,
    subscriptions: BTreeSet<String>,
}

impl<W: Write> StdioBus<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            connected: true,
            subscriptions: BTreeSet::new(),
        }
    }

    /// Parses an inbound line into `(topic, payload)` if it is subscribed.
    pub fn accept(&self, line: &str) -> Option<(String, String)> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return None;
        }
        let (topic, payload) = match line.split_once(char::is_whitespace) {
            Some((t, p)) => (t, p.trim()),
            None => (line, ""),
        };
        if !self.connected || !self.subscriptions.contains(topic) {
            debug!(topic, "dropping message on unsubscribed topic");
            return None;
        }
        Some((topic.to_string(), payload.to_string()))
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Bus for StdioBus<W> {
    fn subscribe(&mut self, topic: &str) -> Result<(), BusError> {
        debug!(topic, "subscribe");
        self.subscriptions.insert(topic.to_string());
        Ok(())
    }

    fn publish(&mut self, message: &Publish) -> Result<(), BusError> {
        if !self.connected {
            warn!(topic = %message.topic, "publish after disconnect");
            return Err(BusError::Disconnected);
        }
        debug!(topic = %message.topic, payload = %message.payload, retain = message.retain, "publish");
        writeln!(self.writer, "{} {}", message.topic, message.payload)?;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), BusError> {
        self.connected = false;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_topic_and_payload() {
        let mut bus = StdioBus::new(Vec::new());
        bus.publish(&Publish {
            topic: "wm/output".into(),
            payload: "1.5".into(),
            retain: false,
        })
        .expect("publish");
        bus.disconnect().expect("disconnect");

        assert_eq!(String::from_utf8(bus.into_inner()).ok().as_deref(), Some("wm/output 1.5\n"));
    }

    #[test]
    fn accepts_only_subscribed_topics() {
        let mut bus = StdioBus::new(Vec::new());
        bus.subscribe("wm/input").expect("subscribe");

        assert_eq!(
            bus.accept("wm/input  1200.5\n"),
            Some(("wm/input".into(), "1200.5".into()))
        );
        assert_eq!(bus.accept("wm/other 3"), None);
        assert_eq!(bus.accept("   "), None);
        assert_eq!(bus.accept("wm/input"), Some(("wm/input".into(), String::new())));
    }
}
