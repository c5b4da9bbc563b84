pub mod csv_store;
pub mod stats;

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error};

use crate::heart_rate::HeartbeatSample;
use csv_store::CsvStore;
use stats::RollingStatistics;

pub use stats::DEFAULT_WINDOW;

/// The sink is the only writer of the log and CSV file,
/// everything else locks it to read.
pub type SharedSink = Arc<Mutex<HeartbeatSink>>;

const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Notifications sent to anyone watching the sink
#[derive(Debug, Clone, PartialEq)]
pub enum SinkUpdate {
    SampleRecorded(HeartbeatSample),
    LogChanged { len: usize },
    /// The sample is still in the log, but didn't make it to disk
    PersistFailed(String),
}

/// Keeps every sample seen this session, and appends each one to the CSV store.
pub struct HeartbeatSink {
    log: Vec<HeartbeatSample>,
    store: CsvStore,
    update_tx: broadcast::Sender<SinkUpdate>,
}

impl HeartbeatSink {
    pub fn new(store: CsvStore) -> Self {
        let (update_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            log: Vec::new(),
            store,
            update_tx,
        }
    }

    pub fn shared(self) -> SharedSink {
        Arc::new(Mutex::new(self))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SinkUpdate> {
        self.update_tx.subscribe()
    }

    /// Adds the sample to the log, then tries to persist it.
    ///
    /// The log append always happens, even if writing to disk fails.
    pub fn record(&mut self, sample: HeartbeatSample) {
        self.log.push(sample);
        self.notify(SinkUpdate::SampleRecorded(sample));
        self.notify(SinkUpdate::LogChanged {
            len: self.log.len(),
        });
        self.persist(&sample);
    }

    /// Appends the sample to the CSV store. Failures are only logged and broadcast.
    pub fn persist(&self, sample: &HeartbeatSample) {
        match self.store.append(sample) {
            Ok(()) => debug!("Persisted {} BPM to {}", sample.value, self.store.path().display()),
            Err(e) => {
                error!("Failed to persist heartbeat sample: {e}");
                self.notify(SinkUpdate::PersistFailed(e.to_string()));
            }
        }
    }

    /// `None` until at least `window_size` samples have been recorded.
    pub fn statistics(&self, window_size: usize) -> Option<RollingStatistics> {
        RollingStatistics::from_trailing(&self.log, window_size)
    }

    pub fn samples(&self) -> &[HeartbeatSample] {
        &self.log
    }

    /// Up to the last `count` samples
    pub fn tail(&self, count: usize) -> &[HeartbeatSample] {
        &self.log[self.log.len().saturating_sub(count)..]
    }

    pub fn latest(&self) -> Option<&HeartbeatSample> {
        self.log.last()
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn store(&self) -> &CsvStore {
        &self.store
    }

    fn notify(&self, update: SinkUpdate) {
        // Nobody listening is fine
        let _ = self.update_tx.send(update);
    }
}
