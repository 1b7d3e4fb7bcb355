//! Phone side: reads today's weather and publishes it to the watch.

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::models::{SyncRecord, TemperatureUnit, WeatherSnapshot};
use crate::sync::{ChannelError, SyncChannel};

/// Where the producer reads the current forecast from.
pub trait WeatherSource: Send + Sync {
    /// Today's snapshot, or `None` when the store has nothing for today.
    fn current_snapshot(&self) -> Option<WeatherSnapshot>;
}

impl<F> WeatherSource for F
where
    F: Fn() -> Option<WeatherSnapshot> + Send + Sync,
{
    fn current_snapshot(&self) -> Option<WeatherSnapshot> {
        self()
    }
}

/// Result of one publish trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Published(SyncRecord),
    /// The source had no snapshot; nothing was sent
    NoSnapshot,
    Failed(ChannelError),
}

#[derive(Clone)]
pub struct Producer {
    inner: Arc<ProducerInner>,
}

struct ProducerInner {
    channel: Arc<SyncChannel>,
    source: Arc<dyn WeatherSource>,
    units: TemperatureUnit,
    last_timestamp: AtomicI64,
}

impl Producer {
    pub fn new(
        channel: Arc<SyncChannel>,
        source: Arc<dyn WeatherSource>,
        units: TemperatureUnit,
    ) -> Self {
        Self {
            inner: Arc::new(ProducerInner {
                channel,
                source,
                units,
                last_timestamp: AtomicI64::new(i64::MIN),
            }),
        }
    }

    pub fn units(&self) -> TemperatureUnit {
        self.inner.units
    }

    /// Publishes the current snapshot in the background.
    ///
    /// Returns immediately; the handle resolves to the outcome.
    pub fn trigger(&self) -> JoinHandle<PublishOutcome> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.publish_current().await })
    }

    /// Publishes the current snapshot and waits for the outcome.
    pub async fn publish_now(&self) -> PublishOutcome {
        self.inner.publish_current().await
    }

    /// Triggers a publish every `period`, starting right away, until the
    /// returned task is aborted.
    pub fn run_periodic(&self, period: Duration) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                inner.publish_current().await;
            }
        })
    }

    /// Formats `snapshot` into a record stamped with the next timestamp.
    pub fn build_record(&self, snapshot: &WeatherSnapshot) -> SyncRecord {
        self.inner.build_record(snapshot)
    }
}

impl ProducerInner {
    async fn publish_current(&self) -> PublishOutcome {
        let Some(snapshot) = self.source.current_snapshot() else {
            tracing::info!("no weather for today, skipping publish");
            return PublishOutcome::NoSnapshot;
        };

        let record = self.build_record(&snapshot);
        match self.send(&record).await {
            Ok(()) => {
                tracing::info!(record = %record, "published weather");
                PublishOutcome::Published(record)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to publish weather");
                PublishOutcome::Failed(e)
            }
        }
    }

    async fn send(&self, record: &SyncRecord) -> Result<(), ChannelError> {
        let pending = match self.channel.publish(record) {
            Ok(pending) => pending,
            Err(ChannelError::NotConnected) => {
                tracing::debug!("channel not connected, connecting before publish");
                self.channel.connect().await?;
                self.channel.publish(record)?
            }
            Err(e) => return Err(e),
        };
        pending.await
    }

    fn build_record(&self, snapshot: &WeatherSnapshot) -> SyncRecord {
        SyncRecord::new(
            self.next_timestamp(),
            self.units.format(snapshot.temp_max),
            self.units.format(snapshot.temp_min),
            snapshot.condition_code,
        )
    }

    /// Wall clock in ms, bumped past the previous value when the clock
    /// stalls or steps back.
    fn next_timestamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let next = |prev: i64| now.max(prev.saturating_add(1));
        match self
            .last_timestamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| Some(next(prev)))
        {
            Ok(prev) | Err(prev) => next(prev),
        }
    }
}
