//! Contract between the channel and the transport that carries it.
//!
//! The transport owns the actual link to the other device. It is driven
//! through [`Transport`] and reports back through the [`EventSink`] it was
//! bound to. Every call and every event names the [`SessionId`] it belongs
//! to, so the channel can drop events from sessions it already tore down.
//!
//! The transport owns connect timeouts: a connect that never gets an answer
//! leaves the channel in `Connecting`.

use futures::future::BoxFuture;
use std::fmt;
use tokio::sync::mpsc;

use super::error::TransportError;
use super::protocol::WireMap;

/// Identifies one connect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Something the transport observed about a session.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The connect request succeeded
    Connected,
    /// The link dropped temporarily
    Suspended { cause: i32 },
    /// The link is back after a suspension
    Resumed,
    /// Hard failure of the connect request or the session
    Failed(TransportError),
    /// The item at `topic` changed, or was fetched on request
    RecordChanged { topic: String, record: WireMap },
}

/// A transport event tagged with its session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub session: SessionId,
    pub event: TransportEvent,
}

/// Sending half of a channel's event queue.
///
/// Cheap to clone; emitting never blocks and never calls into the channel
/// directly, so a transport may emit from inside any of its methods.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { tx }
    }

    /// Queues an event. Returns false if the channel is gone.
    pub fn emit(&self, session: SessionId, event: TransportEvent) -> bool {
        self.tx.send(SessionEvent { session, event }).is_ok()
    }
}

/// The narrow transport surface the channel depends on.
///
/// Implementations must not block. Requests are issued when the method is
/// called; the future returned by `put_record` only reports the outcome,
/// and dropping it does not cancel the put.
pub trait Transport: Send + Sync {
    /// Hands the transport the sink it reports events to.
    fn bind(&self, sink: EventSink);

    fn connect(&self, session: SessionId);

    fn disconnect(&self, session: SessionId);

    fn put_record(
        &self,
        session: SessionId,
        topic: &str,
        record: WireMap,
    ) -> BoxFuture<'static, Result<(), TransportError>>;

    fn add_listener(&self, session: SessionId, topic: &str);

    fn remove_listener(&self, session: SessionId, topic: &str);

    /// Requests the current item at `topic`. It arrives as
    /// [`TransportEvent::RecordChanged`] if one exists.
    fn fetch_record(&self, session: SessionId, topic: &str);
}
