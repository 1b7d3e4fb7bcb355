//! Watch side: keeps the latest record for the face and asks for redraws.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::models::{SyncRecord, WeatherIcon};
use crate::sync::{ChannelError, ChannelState, DecodeError, SyncChannel};

/// Pause between reconnect attempts in [`Consumer::run`].
pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// What the face draws. Replaced as a whole on every accepted record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderState {
    pub record: Option<SyncRecord>,
    pub icon: WeatherIcon,
}

impl RenderState {
    pub fn from_record(record: SyncRecord) -> Self {
        Self {
            icon: WeatherIcon::from_condition(record.condition_code),
            record: Some(record),
        }
    }

    pub fn has_record(&self) -> bool {
        self.record.is_some()
    }
}

/// Invalidates the face so it is drawn again.
///
/// Called on the channel's event task; later updates wait until it returns.
pub trait RedrawSink: Send + Sync {
    fn request_redraw(&self);
}

impl<F> RedrawSink for F
where
    F: Fn() + Send + Sync,
{
    fn request_redraw(&self) {
        self()
    }
}

pub struct Consumer {
    state: RwLock<Arc<RenderState>>,
    decode_failures: AtomicU64,
    redraw: Arc<dyn RedrawSink>,
}

impl Consumer {
    pub fn new(redraw: Arc<dyn RedrawSink>) -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(Arc::new(RenderState::default())),
            decode_failures: AtomicU64::new(0),
            redraw,
        })
    }

    /// Subscribes to `channel`, replacing any earlier subscription on it.
    pub fn attach(self: &Arc<Self>, channel: &SyncChannel) -> Result<(), ChannelError> {
        let consumer = Arc::clone(self);
        channel.subscribe(move |update| consumer.handle_update(update))
    }

    /// Connects `channel` if needed, then subscribes.
    pub async fn connect_and_attach(
        self: &Arc<Self>,
        channel: &SyncChannel,
    ) -> Result<(), ChannelError> {
        channel.connect().await?;
        self.attach(channel)
    }

    /// Keeps `channel` connected and attached until it is closed.
    ///
    /// Connects and subscribes right away, then reconnects whenever the
    /// channel falls back to `Idle`, whether from a surfaced link failure
    /// or a `disconnect`. A subscription the channel kept is re-attached by
    /// the channel on connect; otherwise this attaches again. Failed
    /// attempts are retried after [`RECONNECT_DELAY`]. The task holds the
    /// channel and ends once it is closed.
    pub fn run(self: &Arc<Self>, channel: Arc<SyncChannel>) -> JoinHandle<()> {
        let consumer = Arc::clone(self);
        tokio::spawn(async move {
            let mut states = channel.watch_state();
            loop {
                let state = *states.borrow_and_update();
                match state {
                    ChannelState::Disconnected => break,
                    ChannelState::Idle => {
                        let result = if channel.has_subscription() {
                            tracing::info!("watch link lost, reconnecting");
                            channel.connect().await
                        } else {
                            consumer.connect_and_attach(&channel).await
                        };
                        match result {
                            Ok(()) => {}
                            Err(ChannelError::Closed) => break,
                            Err(e) => {
                                tracing::warn!(
                                    error = %e,
                                    delay_ms = RECONNECT_DELAY.as_millis() as u64,
                                    "reconnect failed, retrying"
                                );
                                tokio::time::sleep(RECONNECT_DELAY).await;
                                continue;
                            }
                        }
                    }
                    _ => {}
                }
                if states.changed().await.is_err() {
                    break;
                }
            }
            tracing::debug!("consumer stopped");
        })
    }

    pub fn handle_update(&self, update: Result<SyncRecord, DecodeError>) {
        let record = match update {
            Ok(record) => record,
            Err(e) => {
                let failures = self.decode_failures.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(error = %e, failures, "dropping undecodable weather record");
                return;
            }
        };

        {
            let mut state = self.state.write();
            if state.record.as_ref() == Some(&record) {
                tracing::debug!(timestamp = record.timestamp, "ignoring re-sent record");
                return;
            }
            tracing::info!(record = %record, "weather updated");
            *state = Arc::new(RenderState::from_record(record));
        }

        self.redraw.request_redraw();
    }

    /// Current snapshot; cheap to call from the draw path.
    pub fn render_state(&self) -> Arc<RenderState> {
        Arc::clone(&self.state.read())
    }

    pub fn decode_failures(&self) -> u64 {
        self.decode_failures.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use crate::sync::{MemoryHub, WireKey};
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    fn counting() -> (Arc<Consumer>, Arc<AtomicUsize>) {
        let redraws = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&redraws);
        let consumer = Consumer::new(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        (consumer, redraws)
    }

    fn signalling() -> (Arc<Consumer>, mpsc::UnboundedReceiver<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let consumer = Consumer::new(Arc::new(move || {
            let _ = tx.send(());
        }));
        (consumer, rx)
    }

    async fn wait_until(cond: impl Fn() -> bool) {
        timeout(WAIT, async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for condition");
    }

    #[test]
    fn test_starts_without_record() {
        let (consumer, _) = counting();

        let state = consumer.render_state();
        assert!(!state.has_record());
        assert_eq!(state.icon, WeatherIcon::Clear);
    }

    #[test]
    fn test_decode_error_keeps_previous_state() {
        let (consumer, redraws) = counting();

        consumer.handle_update(Ok(SyncRecord::new(1, "20°", "10°", 800)));
        consumer.handle_update(Err(DecodeError::MissingField(WireKey::TempMin)));

        let state = consumer.render_state();
        let record = state.record.as_ref().unwrap();
        assert_eq!(record.temp_max_display, "20°");
        assert_eq!(record.temp_min_display, "10°");
        assert_eq!(consumer.decode_failures(), 1);
        assert_eq!(redraws.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_resent_record_is_noop() {
        let (consumer, redraws) = counting();
        let record = SyncRecord::new(5, "20°", "10°", 800);

        consumer.handle_update(Ok(record.clone()));
        let before = consumer.render_state();
        consumer.handle_update(Ok(record));

        assert!(Arc::ptr_eq(&before, &consumer.render_state()));
        assert_eq!(redraws.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_new_record_replaces_state() {
        let (consumer, redraws) = counting();

        consumer.handle_update(Ok(SyncRecord::new(1, "20°", "10°", 800)));
        let old = consumer.render_state();
        consumer.handle_update(Ok(SyncRecord::new(2, "21°", "11°", 601)));

        assert_eq!(old.icon, WeatherIcon::Clear);
        assert_eq!(consumer.render_state().icon, WeatherIcon::Snow);
        assert_eq!(redraws.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_end_to_end_from_phone_to_face() {
        let hub = MemoryHub::new();
        let phone = SyncChannel::spawn(Arc::new(hub.transport()), RetryPolicy::default());
        let watch = SyncChannel::spawn(Arc::new(hub.transport()), RetryPolicy::default());

        let (consumer, mut redraws) = signalling();
        consumer.connect_and_attach(&watch).await.unwrap();

        phone.connect().await.unwrap();
        phone
            .publish(&SyncRecord::new(100, "25°", "15°", 200))
            .unwrap()
            .await
            .unwrap();

        timeout(WAIT, redraws.recv())
            .await
            .expect("timed out waiting for redraw");

        let state = consumer.render_state();
        assert_eq!(
            state.record,
            Some(SyncRecord::new(100, "25°", "15°", 200))
        );
        assert_eq!(state.icon, WeatherIcon::Storm);

        // One record, one redraw.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(redraws.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_run_recovers_from_link_loss() {
        let hub = MemoryHub::new();
        let phone = SyncChannel::spawn(Arc::new(hub.transport()), RetryPolicy::default());
        let watch_transport = hub.transport();
        let watch = Arc::new(SyncChannel::spawn(
            Arc::new(watch_transport.clone()),
            RetryPolicy::surface_once(),
        ));

        let (consumer, mut redraws) = signalling();
        let task = consumer.run(Arc::clone(&watch));
        wait_until(|| watch.state() == ChannelState::Listening).await;

        phone.connect().await.unwrap();
        phone
            .publish(&SyncRecord::new(1, "20°", "10°", 800))
            .unwrap()
            .await
            .unwrap();
        timeout(WAIT, redraws.recv()).await.unwrap();

        assert!(watch_transport.drop_link(4));
        wait_until(|| {
            watch_transport.stats().connects == 2 && watch.state() == ChannelState::Listening
        })
        .await;

        phone
            .publish(&SyncRecord::new(2, "30°", "20°", 500))
            .unwrap()
            .await
            .unwrap();
        timeout(WAIT, redraws.recv()).await.unwrap();

        assert_eq!(
            consumer.render_state().record,
            Some(SyncRecord::new(2, "30°", "20°", 500))
        );

        watch.close();
        timeout(WAIT, task).await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_retries_after_failed_reconnect() {
        let hub = MemoryHub::new();
        let watch_transport = hub.transport();
        let watch = Arc::new(SyncChannel::spawn(
            Arc::new(watch_transport.clone()),
            RetryPolicy::surface_once(),
        ));

        let (consumer, _redraws) = signalling();
        let task = consumer.run(Arc::clone(&watch));
        wait_until(|| watch.state() == ChannelState::Listening).await;

        watch_transport.fail_next_connects(1, 7);
        assert!(watch_transport.drop_link(4));
        wait_until(|| {
            watch_transport.stats().connects == 3 && watch.state() == ChannelState::Listening
        })
        .await;

        assert!(watch.has_subscription());
        assert_eq!(watch.last_error().map(|e| e.code), Some(7));

        watch.close();
        timeout(WAIT, task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_run_stops_on_closed_channel() {
        let hub = MemoryHub::new();
        let watch = Arc::new(SyncChannel::spawn(
            Arc::new(hub.transport()),
            RetryPolicy::default(),
        ));
        watch.close();

        let (consumer, _redraws) = signalling();
        let task = consumer.run(Arc::clone(&watch));

        timeout(WAIT, task).await.unwrap().unwrap();
        assert!(!consumer.render_state().has_record());
    }
}
