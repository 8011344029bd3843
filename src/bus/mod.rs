//! Message-bus boundary.
//!
//! The control core never talks to a transport directly. It pushes
//! [`BusRequest`]s into an [`Outbox`], a non-blocking handle that any number
//! of producers (the allocator, every output's sink) can clone. An adapter
//! later drains the matching [`OutboxReceiver`] into a concrete [`Bus`] with
//! [`pump`].

use tokio::sync::mpsc;
use tracing::trace;

pub mod memory;
pub mod sink;
pub mod stdio;
/// Topic naming rooted at the client id.
pub mod topics;

pub use memory::MemoryBus;
pub use sink::OutboundSink;
pub use stdio::StdioBus;
pub use topics::{OutputTopics, Topics};

/// A single outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publish {
    pub topic: String,
    pub payload: String,
    /// Whether the bus should keep this as the topic's last known value.
    pub retain: bool,
}

/// Everything the core can ask of the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusRequest {
    Subscribe(String),
    Publish(Publish),
    Disconnect,
}

/// Errors raised by a bus adapter.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("bus is disconnected")]
    Disconnected,
    #[error("bus io: {0}")]
    Io(#[from] std::io::Error),
}

/// The transport primitives the core relies on.
pub trait Bus {
    fn subscribe(&mut self, topic: &str) -> Result<(), BusError>;

    fn publish(&mut self, message: &Publish) -> Result<(), BusError>;

    fn disconnect(&mut self) -> Result<(), BusError>;
}

/// Producer side of the outbound queue. Sending never blocks.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<BusRequest>,
}

/// Consumer side of the outbound queue.
#[derive(Debug)]
pub struct OutboxReceiver {
    rx: mpsc::UnboundedReceiver<BusRequest>,
}

/// Creates a connected outbox pair.
pub fn outbox() -> (Outbox, OutboxReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Outbox { tx }, OutboxReceiver { rx })
}

impl Outbox {
    pub fn publish(&self, topic: impl Into<String>, payload: impl Into<String>) {
        self.send(BusRequest::Publish(Publish {
            topic: topic.into(),
            payload: payload.into(),
            retain: false,
        }));
    }

    pub fn publish_retained(&self, topic: impl Into<String>, payload: impl Into<String>) {
        self.send(BusRequest::Publish(Publish {
            topic: topic.into(),
            payload: payload.into(),
            retain: true,
        }));
    }

    pub fn subscribe(&self, topic: impl Into<String>) {
        self.send(BusRequest::Subscribe(topic.into()));
    }

    pub fn disconnect(&self) {
        self.send(BusRequest::Disconnect);
    }

    fn send(&self, request: BusRequest) {
        // Nobody draining means the adapter is gone; the request is moot.
        if let Err(e) = self.tx.send(request) {
            trace!(request = ?e.0, "outbox closed, dropping request");
        }
    }
}

impl OutboxReceiver {
    /// Takes one pending request without waiting.
    pub fn try_next(&mut self) -> Option<BusRequest> {
        self.rx.try_recv().ok()
    }

    /// Takes every pending request without waiting.
    pub fn drain(&mut self) -> Vec<BusRequest> {
        std::iter::from_fn(|| self.try_next()).collect()
    }

    /// Takes every pending publish, discarding other requests.
    pub fn drain_publishes(&mut self) -> Vec<Publish> {
        self.drain()
            .into_iter()
            .filter_map(|r| match r {
                BusRequest::Publish(p) => Some(p),
                _ => None,
            })
            .collect()
    }
}

/// Forwards every pending request to `bus`, in order.
///
/// Returns `true` once a disconnect request has been forwarded.
///
/// # Errors
///
/// Stops at and returns the first bus error.
pub fn pump(outbox: &mut OutboxReceiver, bus: &mut impl Bus) -> Result<bool, BusError> {
    let mut disconnected = false;
    while let Some(request) = outbox.try_next() {
        match request {
            BusRequest::Subscribe(topic) => bus.subscribe(&topic)?,
            BusRequest::Publish(message) => bus.publish(&message)?,
            BusRequest::Disconnect => {
                bus.disconnect()?;
                disconnected = true;
            }
        }
    }
    Ok(disconnected)
}
