//! Session state machine for the weather record.
//!
//! A [`SyncChannel`] owns at most one live session with the transport and
//! drives it through [`ChannelState`]. Transport events are queued on an
//! unbounded channel and applied one at a time by a pump task, and every
//! transition happens under a single lock, so racing callbacks can never
//! interleave a transition. Record updates are handed to the subscriber
//! after that lock is released.
//!
//! ## Lifecycle
//!
//! 1. `connect()` opens a session and enters `Connecting`
//! 2. The transport answers with success (`Connected`) or failure
//! 3. `publish()` makes the channel a publisher, `subscribe()` a listener
//! 4. A suspension detaches listeners; resume reconnects on a new session
//! 5. `disconnect()` returns to `Idle`, `close()` ends in `Disconnected`

use futures::future::BoxFuture;
use parking_lot::{Mutex, ReentrantMutex};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::error::{ChannelError, DecodeError, TransportError};
use super::protocol::{self, WireMap, WEATHER_TOPIC};
use super::state::{ChannelSession, ChannelState, Role};
use super::transport::{EventSink, SessionEvent, SessionId, Transport, TransportEvent};
use crate::config::RetryPolicy;
use crate::models::SyncRecord;

/// Callback receiving each remote change of the record.
pub type UpdateCallback = Arc<dyn Fn(Result<SyncRecord, DecodeError>) + Send + Sync>;

/// Connection to the remote peer carrying the weather record.
///
/// Subscription callbacks run on the pump task, one at a time, without the
/// state lock held, so they may query or drive the channel. A slow
/// callback delays later events.
pub struct SyncChannel {
    shared: Arc<Shared>,
    pump: JoinHandle<()>,
}

struct Shared {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    inner: Mutex<Inner>,
    /// Held while a callback runs; `close` takes it to wait one out
    delivery: ReentrantMutex<()>,
    state_tx: watch::Sender<ChannelState>,
}

struct Inner {
    state: ChannelState,
    session: Option<ChannelSession>,
    role: Option<Role>,
    subscriber: Option<UpdateCallback>,
    /// Bumped whenever the subscriber is replaced or dropped
    generation: u64,
    /// Listener attached on the live session
    listening: bool,
    next_session: u64,
    last_error: Option<TransportError>,
    waiters: Vec<oneshot::Sender<Result<(), ChannelError>>>,
}

impl SyncChannel {
    /// Creates an idle channel bound to `transport`.
    ///
    /// Spawns the event pump, so it must be called inside a tokio runtime.
    pub fn spawn(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ChannelState::Idle);

        let shared = Arc::new(Shared {
            transport,
            policy,
            inner: Mutex::new(Inner {
                state: ChannelState::Idle,
                session: None,
                role: None,
                subscriber: None,
                generation: 0,
                listening: false,
                next_session: 0,
                last_error: None,
                waiters: Vec::new(),
            }),
            delivery: ReentrantMutex::new(()),
            state_tx,
        });

        shared.transport.bind(EventSink::new(tx));
        let pump = tokio::spawn(run_pump(Arc::downgrade(&shared), rx));

        Self { shared, pump }
    }

    pub fn state(&self) -> ChannelState {
        self.shared.inner.lock().state
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.shared.state_tx.subscribe()
    }

    /// Snapshot of the live session, if any.
    pub fn session(&self) -> Option<ChannelSession> {
        self.shared.inner.lock().session.clone()
    }

    /// Most recent transport failure, kept after the session is gone.
    pub fn last_error(&self) -> Option<TransportError> {
        self.shared.inner.lock().last_error.clone()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.shared.policy
    }

    /// Whether a subscription is held, including one kept across a
    /// surfaced link failure until the next connect re-attaches it.
    pub fn has_subscription(&self) -> bool {
        self.shared.inner.lock().subscriber.is_some()
    }

    /// Starts connecting, or joins the attempt already in flight.
    ///
    /// The returned future resolves once the session is established or the
    /// retry policy gives up. Dropping it does not cancel the attempt.
    pub fn connect(&self) -> PendingConnect {
        let (tx, rx) = oneshot::channel();
        let mut inner = self.shared.inner.lock();

        match inner.state {
            ChannelState::Disconnected => {
                let _ = tx.send(Err(ChannelError::Closed));
            }
            ChannelState::Connected | ChannelState::Publishing | ChannelState::Listening => {
                let _ = tx.send(Ok(()));
            }
            ChannelState::Connecting | ChannelState::Suspended => {
                inner.waiters.push(tx);
            }
            ChannelState::Idle => {
                inner.waiters.push(tx);
                self.shared.open_session(&mut inner, 0);
            }
        }

        PendingConnect { rx }
    }

    /// Sends a record to the peer.
    ///
    /// Fails fast with [`ChannelError::NotConnected`] unless a session is
    /// established; nothing is queued. Identical records are sent again.
    pub fn publish(&self, record: &SyncRecord) -> Result<PendingPublish, ChannelError> {
        let mut inner = self.shared.inner.lock();

        match inner.state {
            ChannelState::Connected | ChannelState::Publishing => {}
            ChannelState::Listening => return Err(ChannelError::RoleConflict(Role::Subscriber)),
            ChannelState::Disconnected => return Err(ChannelError::Closed),
            _ => return Err(ChannelError::NotConnected),
        }
        let session = match inner.session.as_ref() {
            Some(s) => s.id,
            None => return Err(ChannelError::NotConnected),
        };

        inner.role = Some(Role::Publisher);
        self.shared.set_state(&mut inner, ChannelState::Publishing);

        let wire: WireMap = protocol::encode(record);
        tracing::debug!(session = %session, timestamp = record.timestamp, "publishing weather record");
        let put = self.shared.transport.put_record(session, WEATHER_TOPIC, wire);

        Ok(PendingPublish { put })
    }

    /// Registers the callback for remote changes, replacing any previous one.
    ///
    /// The current item is requested right away so a new subscriber starts
    /// from the latest record.
    pub fn subscribe<F>(&self, on_update: F) -> Result<(), ChannelError>
    where
        F: Fn(Result<SyncRecord, DecodeError>) + Send + Sync + 'static,
    {
        let mut inner = self.shared.inner.lock();

        match inner.state {
            ChannelState::Connected | ChannelState::Listening => {}
            ChannelState::Publishing => return Err(ChannelError::RoleConflict(Role::Publisher)),
            ChannelState::Disconnected => return Err(ChannelError::Closed),
            _ => return Err(ChannelError::NotConnected),
        }
        let session = match inner.session.as_ref() {
            Some(s) => s.id,
            None => return Err(ChannelError::NotConnected),
        };

        if inner.subscriber.is_some() {
            tracing::debug!("replacing existing subscription");
        }
        inner.subscriber = Some(Arc::new(on_update));
        inner.generation += 1;
        inner.role = Some(Role::Subscriber);

        if !inner.listening {
            self.shared.transport.add_listener(session, WEATHER_TOPIC);
            inner.listening = true;
        }
        self.shared.set_state(&mut inner, ChannelState::Listening);
        self.shared.transport.fetch_record(session, WEATHER_TOPIC);

        Ok(())
    }

    /// Detaches the subscription, releases the session, and returns to `Idle`.
    pub fn disconnect(&self) {
        {
            let mut inner = self.shared.inner.lock();
            if inner.state == ChannelState::Disconnected {
                return;
            }
            self.shared
                .teardown(&mut inner, ChannelState::Idle, ChannelError::NotConnected);
        }
        drop(self.shared.delivery.lock());
    }

    /// Tears the channel down for good. Safe to call from any state.
    ///
    /// No callback fires once this returns.
    pub fn close(&self) {
        {
            let mut inner = self.shared.inner.lock();
            if inner.state == ChannelState::Disconnected {
                return;
            }
            self.shared
                .teardown(&mut inner, ChannelState::Disconnected, ChannelError::Closed);
        }
        // Wait out a callback already running on the pump.
        drop(self.shared.delivery.lock());
        tracing::info!("channel closed");
    }
}

impl Drop for SyncChannel {
    fn drop(&mut self) {
        self.close();
        self.pump.abort();
    }
}

async fn run_pump(shared: Weak<Shared>, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
    while let Some(event) = events.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        shared.handle_event(event);
    }
}

impl Shared {
    fn set_state(&self, inner: &mut Inner, state: ChannelState) {
        if inner.state != state {
            tracing::debug!(from = %inner.state, to = %state, "channel state change");
        }
        inner.state = state;
        if let Some(session) = inner.session.as_mut() {
            session.state = state;
        }
        self.state_tx.send_replace(state);
    }

    /// Replaces the current session (if any) with a fresh one and connects it.
    fn open_session(&self, inner: &mut Inner, retry_count: u32) {
        if let Some(old) = inner.session.take() {
            self.release(inner, old.id);
        }

        inner.next_session += 1;
        let id = SessionId(inner.next_session);
        inner.session = Some(ChannelSession::new(
            id,
            retry_count,
            inner.last_error.clone(),
        ));
        self.set_state(inner, ChannelState::Connecting);

        tracing::debug!(session = %id, retry_count, "opening session");
        self.transport.connect(id);
    }

    fn release(&self, inner: &mut Inner, id: SessionId) {
        if inner.listening {
            self.transport.remove_listener(id, WEATHER_TOPIC);
            inner.listening = false;
        }
        self.transport.disconnect(id);
    }

    fn teardown(&self, inner: &mut Inner, next: ChannelState, reason: ChannelError) {
        inner.subscriber = None;
        inner.generation += 1;
        inner.role = None;
        if let Some(old) = inner.session.take() {
            self.release(inner, old.id);
        }
        self.set_state(inner, next);
        for waiter in inner.waiters.drain(..) {
            let _ = waiter.send(Err(reason.clone()));
        }
    }

    fn handle_event(&self, SessionEvent { session, event }: SessionEvent) {
        let delivery = {
            let mut inner = self.inner.lock();

            let live = inner.session.as_ref().map(|s| s.id);
            if live != Some(session) {
                tracing::debug!(session = %session, "dropping event for stale session");
                return;
            }

            let delivery = match event {
                TransportEvent::Connected => {
                    self.on_connected(&mut inner, session);
                    None
                }
                TransportEvent::Suspended { cause } => {
                    self.on_suspended(&mut inner, session, cause);
                    None
                }
                TransportEvent::Resumed => {
                    self.on_resumed(&mut inner);
                    None
                }
                TransportEvent::Failed(err) => {
                    self.on_failed(&mut inner, err);
                    None
                }
                TransportEvent::RecordChanged { topic, record } => {
                    self.on_record(&inner, &topic, &record)
                }
            };
            delivery
        };

        if let Some(delivery) = delivery {
            self.deliver(delivery);
        }
    }

    /// Runs the callback with only the delivery lock held. Skipped when the
    /// subscription changed after the update was decoded.
    fn deliver(&self, Delivery { callback, generation, update }: Delivery) {
        let _delivering = self.delivery.lock();
        {
            let inner = self.inner.lock();
            if inner.generation != generation || inner.state != ChannelState::Listening {
                tracing::debug!("subscription changed, dropping update");
                return;
            }
        }
        callback(update);
    }

    fn on_connected(&self, inner: &mut Inner, session: SessionId) {
        if inner.state != ChannelState::Connecting {
            tracing::warn!(state = %inner.state, "ignoring connect success outside connecting");
            return;
        }
        if let Some(s) = inner.session.as_mut() {
            s.retry_count = 0;
        }

        // A retained subscription is re-attached on every new session.
        let next = match inner.role {
            Some(Role::Subscriber) if inner.subscriber.is_some() => {
                self.transport.add_listener(session, WEATHER_TOPIC);
                inner.listening = true;
                self.transport.fetch_record(session, WEATHER_TOPIC);
                ChannelState::Listening
            }
            Some(Role::Publisher) => ChannelState::Publishing,
            _ => ChannelState::Connected,
        };
        self.set_state(inner, next);
        tracing::info!(session = %session, state = %next, "channel connected");

        for waiter in inner.waiters.drain(..) {
            let _ = waiter.send(Ok(()));
        }
    }

    fn on_suspended(&self, inner: &mut Inner, session: SessionId, cause: i32) {
        if !inner.state.is_established() {
            tracing::warn!(state = %inner.state, cause, "ignoring suspension outside an established session");
            return;
        }
        if inner.listening {
            self.transport.remove_listener(session, WEATHER_TOPIC);
            inner.listening = false;
        }
        self.set_state(inner, ChannelState::Suspended);
        tracing::info!(session = %session, cause, "channel suspended");
    }

    fn on_resumed(&self, inner: &mut Inner) {
        if inner.state != ChannelState::Suspended {
            tracing::warn!(state = %inner.state, "ignoring resume outside suspension");
            return;
        }
        let retry_count = inner.session.as_ref().map_or(0, |s| s.retry_count);
        tracing::info!("link resumed, reconnecting");
        self.open_session(inner, retry_count);
    }

    fn on_failed(&self, inner: &mut Inner, err: TransportError) {
        let failed_attempts = inner.session.as_ref().map_or(0, |s| s.retry_count) + 1;
        if let Some(s) = inner.session.as_mut() {
            s.retry_count = failed_attempts;
            s.last_error = Some(err.clone());
        }
        inner.last_error = Some(err.clone());

        if self.policy.allows_retry(failed_attempts) {
            tracing::warn!(
                code = err.code,
                attempt = failed_attempts,
                max_attempts = self.policy.max_attempts,
                "connect failed, retrying: {}",
                err.message
            );
            self.open_session(inner, failed_attempts);
            return;
        }

        tracing::warn!(
            code = err.code,
            attempts = failed_attempts,
            "connect failed, giving up: {}",
            err.message
        );
        if let Some(old) = inner.session.take() {
            self.release(inner, old.id);
        }
        self.set_state(inner, ChannelState::Idle);
        for waiter in inner.waiters.drain(..) {
            let _ = waiter.send(Err(ChannelError::TransportFailure(err.code)));
        }
    }

    fn on_record(&self, inner: &Inner, topic: &str, record: &WireMap) -> Option<Delivery> {
        if inner.state != ChannelState::Listening || topic != WEATHER_TOPIC {
            tracing::debug!(state = %inner.state, topic, "ignoring record change");
            return None;
        }
        let callback = Arc::clone(inner.subscriber.as_ref()?);

        let update = protocol::decode(record);
        if let Err(e) = &update {
            tracing::debug!(error = %e, "delivering undecodable record");
        }
        Some(Delivery {
            callback,
            generation: inner.generation,
            update,
        })
    }
}

/// A decoded update waiting to be handed to the subscriber.
struct Delivery {
    callback: UpdateCallback,
    generation: u64,
    update: Result<SyncRecord, DecodeError>,
}

/// Outcome of [`SyncChannel::connect`].
pub struct PendingConnect {
    rx: oneshot::Receiver<Result<(), ChannelError>>,
}

impl Future for PendingConnect {
    type Output = Result<(), ChannelError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(ChannelError::Closed)))
    }
}

/// Outcome of [`SyncChannel::publish`], as reported by the transport.
pub struct PendingPublish {
    put: BoxFuture<'static, Result<(), TransportError>>,
}

impl Future for PendingPublish {
    type Output = Result<(), ChannelError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.put.as_mut().poll(cx).map(|r| r.map_err(ChannelError::from))
    }
}
