use std::collections::{BTreeMap, BTreeSet};

use super::{Bus, BusError, Publish};

/// In-process bus that records everything it is asked to do.
#[derive(Debug, Clone)]
pub struct MemoryBus {
    connected: bool,
    subscriptions: BTreeSet<String>,
    published: Vec<Publish>,
    retained: BTreeMap<String, String>,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBus {
    pub fn new() -> Self {
        Self {
            connected: true,
            subscriptions: BTreeSet::new(),
            published: Vec::new(),
            retained: BTreeMap::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions.contains(topic)
    }

    pub fn subscriptions(&self) -> impl Iterator<Item = &str> {
        self.subscriptions.iter().map(String::as_str)
    }

    /// Every publish seen so far, oldest first.
    pub fn published(&self) -> &[Publish] {
        &self.published
    }

    /// Payloads published on `topic`, oldest first.
    pub fn payloads(&self, topic: &str) -> Vec<&str> {
        self.published
            .iter()
            .filter(|p| p.topic == topic)
            .map(|p| p.payload.as_str())
            .collect()
    }

    /// Most recent payload on `topic`, retained or not.
    pub fn last(&self, topic: &str) -> Option<&str> {
        self.published
            .iter()
            .rev()
            .find(|p| p.topic == topic)
            .map(|p| p.payload.as_str())
    }

    /// Retained value a late subscriber would receive on `topic`.
    pub fn retained(&self, topic: &str) -> Option<&str> {
        self.retained.get(topic).map(String::as_str)
    }

    /// Simulates a broker reconnect: the adapter must subscribe again.
    pub fn reconnect(&mut self) {
        self.connected = true;
        self.subscriptions.clear();
    }
}

impl Bus for MemoryBus {
    fn subscribe(&mut self, topic: &str) -> Result<(), BusError> {
        if !self.connected {
            return Err(BusError::Disconnected);
        }
        self.subscriptions.insert(topic.to_string());
        Ok(())
    }

    fn publish(&mut self, message: &Publish) -> Result<(), BusError> {
        if !self.connected {
            return Err(BusError::Disconnected);
        }
        if message.retain {
            self.retained
                .insert(message.topic.clone(), message.payload.clone());
        }
        self.published.push(message.clone());
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), BusError> {
        self.connected = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(topic: &str, payload: &str, retain: bool) -> Publish {
        Publish {
            topic: topic.into(),
            payload: payload.into(),
            retain,
        }
    }

    #[test]
    fn retained_keeps_latest() {
        let mut bus = MemoryBus::new();
        bus.publish(&msg("c/status", "ON", true)).expect("publish");
        bus.publish(&msg("c/output", "1", false)).expect("publish");
        bus.publish(&msg("c/status", "OFF", true)).expect("publish");

        assert_eq!(bus.retained("c/status"), Some("OFF"));
        assert_eq!(bus.retained("c/output"), None);
        assert_eq!(bus.payloads("c/status"), vec!["ON", "OFF"]);
        assert_eq!(bus.last("c/output"), Some("1"));
    }

    #[test]
    fn disconnected_bus_rejects_publish() {
        let mut bus = MemoryBus::new();
        bus.disconnect().expect("disconnect");
        assert!(matches!(
            bus.publish(&msg("c/output", "1", false)),
            Err(BusError::Disconnected)
        ));

        bus.reconnect();
        assert!(bus.publish(&msg("c/output", "1", false)).is_ok());
        assert_eq!(bus.subscriptions().count(), 0);
    }
}
