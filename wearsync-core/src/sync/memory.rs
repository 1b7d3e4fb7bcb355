//! In-process transport.
//!
//! A [`MemoryHub`] plays the shared data layer both devices talk to: it
//! stores the current item per topic and notifies every peer listening on
//! that topic when an item is put. Each [`MemoryTransport`] is one peer.
//! The test hooks let callers hold connects, fail them, and suspend or
//! resume the link.

use futures::future::{self, BoxFuture};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use uuid::Uuid;

use super::error::TransportError;
use super::protocol::WireMap;
use super::transport::{EventSink, SessionId, Transport, TransportEvent};

/// Status code returned for puts on a session that is not live.
pub const NOT_CONNECTED_CODE: i32 = 17;

/// Counts of calls made on a transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub connects: usize,
    pub disconnects: usize,
    pub puts: usize,
    pub listeners_added: usize,
    pub listeners_removed: usize,
    pub fetches: usize,
}

/// Shared store and listener registry for a set of peers.
#[derive(Default)]
pub struct MemoryHub {
    items: Mutex<HashMap<String, WireMap>>,
    peers: Mutex<Vec<Weak<Peer>>>,
}

impl MemoryHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creates a new peer attached to this hub.
    pub fn transport(self: &Arc<Self>) -> MemoryTransport {
        let peer = Arc::new(Peer {
            node_id: Uuid::new_v4(),
            state: Mutex::new(PeerState::default()),
        });
        let mut peers = self.peers.lock();
        peers.retain(|p| p.strong_count() > 0);
        peers.push(Arc::downgrade(&peer));

        MemoryTransport {
            hub: Arc::clone(self),
            peer,
        }
    }

    /// Returns the item currently stored at `topic`.
    pub fn item(&self, topic: &str) -> Option<WireMap> {
        self.items.lock().get(topic).cloned()
    }

    fn store(&self, topic: &str, record: WireMap) {
        self.items.lock().insert(topic.to_string(), record);
    }

    fn notify(&self, topic: &str, record: &WireMap) {
        let peers: Vec<Arc<Peer>> = self.peers.lock().iter().filter_map(Weak::upgrade).collect();
        for peer in peers {
            peer.deliver(topic, record);
        }
    }
}

struct Peer {
    node_id: Uuid,
    state: Mutex<PeerState>,
}

#[derive(Default)]
struct PeerState {
    sink: Option<EventSink>,
    live: Option<SessionId>,
    suspended: bool,
    held: Option<SessionId>,
    hold_connects: bool,
    failures_left: u32,
    failure_code: i32,
    listeners: HashSet<String>,
    stats: TransportStats,
}

impl PeerState {
    fn emit(&self, session: SessionId, event: TransportEvent) -> bool {
        match &self.sink {
            Some(sink) => sink.emit(session, event),
            None => false,
        }
    }

    fn is_live(&self, session: SessionId) -> bool {
        self.live == Some(session) && !self.suspended
    }

    fn accept(&mut self, session: SessionId) {
        self.live = Some(session);
        self.suspended = false;
        self.listeners.clear();
        self.emit(session, TransportEvent::Connected);
    }
}

impl Peer {
    fn deliver(&self, topic: &str, record: &WireMap) {
        let state = self.state.lock();
        if let Some(session) = state.live {
            if !state.suspended && state.listeners.contains(topic) {
                state.emit(
                    session,
                    TransportEvent::RecordChanged {
                        topic: topic.to_string(),
                        record: record.clone(),
                    },
                );
            }
        }
    }
}

/// One peer of a [`MemoryHub`].
#[derive(Clone)]
pub struct MemoryTransport {
    hub: Arc<MemoryHub>,
    peer: Arc<Peer>,
}

impl MemoryTransport {
    pub fn node_id(&self) -> Uuid {
        self.peer.node_id
    }

    pub fn stats(&self) -> TransportStats {
        self.peer.state.lock().stats
    }

    /// The session the link is currently established for.
    pub fn live_session(&self) -> Option<SessionId> {
        self.peer.state.lock().live
    }

    /// While set, connect requests stay pending until completed or failed.
    pub fn hold_connects(&self, hold: bool) {
        self.peer.state.lock().hold_connects = hold;
    }

    /// Makes the next `count` connect requests fail with `code`.
    pub fn fail_next_connects(&self, count: u32, code: i32) {
        let mut state = self.peer.state.lock();
        state.failures_left = count;
        state.failure_code = code;
    }

    /// Accepts the held connect request, if any.
    pub fn complete_pending(&self) -> bool {
        let mut state = self.peer.state.lock();
        match state.held.take() {
            Some(session) => {
                state.accept(session);
                true
            }
            None => false,
        }
    }

    /// Fails the held connect request, if any.
    pub fn fail_pending(&self, code: i32) -> bool {
        let mut state = self.peer.state.lock();
        match state.held.take() {
            Some(session) => state.emit(
                session,
                TransportEvent::Failed(TransportError::new(code, "connect failed")),
            ),
            None => false,
        }
    }

    /// Interrupts the live session.
    pub fn suspend(&self, cause: i32) -> bool {
        let mut state = self.peer.state.lock();
        let live = state.live;
        match live {
            Some(session) if !state.suspended => {
                state.suspended = true;
                state.emit(session, TransportEvent::Suspended { cause })
            }
            _ => false,
        }
    }

    /// Signals that a suspended session's link is back.
    pub fn resume(&self) -> bool {
        let state = self.peer.state.lock();
        match state.live {
            Some(session) if state.suspended => state.emit(session, TransportEvent::Resumed),
            _ => false,
        }
    }

    /// Kills the live session with a hard failure.
    pub fn drop_link(&self, code: i32) -> bool {
        let mut state = self.peer.state.lock();
        match state.live.take() {
            Some(session) => {
                state.listeners.clear();
                state.suspended = false;
                state.emit(
                    session,
                    TransportEvent::Failed(TransportError::new(code, "link lost")),
                )
            }
            None => false,
        }
    }

    /// Emits an arbitrary event to the bound channel.
    pub fn inject(&self, session: SessionId, event: TransportEvent) -> bool {
        self.peer.state.lock().emit(session, event)
    }
}

impl Transport for MemoryTransport {
    fn bind(&self, sink: EventSink) {
        self.peer.state.lock().sink = Some(sink);
    }

    fn connect(&self, session: SessionId) {
        let mut state = self.peer.state.lock();
        state.stats.connects += 1;

        if state.failures_left > 0 {
            state.failures_left -= 1;
            let code = state.failure_code;
            state.emit(
                session,
                TransportEvent::Failed(TransportError::new(code, "connect failed")),
            );
        } else if state.hold_connects {
            state.held = Some(session);
        } else {
            state.accept(session);
        }
    }

    fn disconnect(&self, session: SessionId) {
        let mut state = self.peer.state.lock();
        state.stats.disconnects += 1;

        if state.live == Some(session) {
            state.live = None;
            state.suspended = false;
            state.listeners.clear();
        }
        if state.held == Some(session) {
            state.held = None;
        }
    }

    fn put_record(
        &self,
        session: SessionId,
        topic: &str,
        record: WireMap,
    ) -> BoxFuture<'static, Result<(), TransportError>> {
        {
            let mut state = self.peer.state.lock();
            state.stats.puts += 1;
            if !state.is_live(session) {
                return Box::pin(future::ready(Err(TransportError::new(
                    NOT_CONNECTED_CODE,
                    "session is not connected",
                ))));
            }
        }

        self.hub.store(topic, record.clone());
        self.hub.notify(topic, &record);
        Box::pin(future::ready(Ok(())))
    }

    fn add_listener(&self, session: SessionId, topic: &str) {
        let mut state = self.peer.state.lock();
        state.stats.listeners_added += 1;
        if state.live == Some(session) {
            state.listeners.insert(topic.to_string());
        }
    }

    fn remove_listener(&self, session: SessionId, topic: &str) {
        let mut state = self.peer.state.lock();
        state.stats.listeners_removed += 1;
        if state.live == Some(session) {
            state.listeners.remove(topic);
        }
    }

    fn fetch_record(&self, session: SessionId, topic: &str) {
        let mut state = self.peer.state.lock();
        state.stats.fetches += 1;
        if !state.is_live(session) {
            return;
        }
        if let Some(record) = self.hub.item(topic) {
            state.emit(
                session,
                TransportEvent::RecordChanged {
                    topic: topic.to_string(),
                    record,
                },
            );
        }
    }
}
