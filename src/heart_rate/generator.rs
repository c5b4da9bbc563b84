use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::SampleSource;
use crate::sink::SharedSink;

struct Running {
    cancel_token: CancellationToken,
    handle: JoinHandle<SampleSource>,
}

/// Owns the sample source and the task that feeds it into the sink.
///
/// The task lives between `start()` and `stop()`, and is cancelled if the
/// generator is dropped while still running.
pub struct SampleGenerator {
    sink: SharedSink,
    source: Option<SampleSource>,
    running: Option<Running>,
    parent_token: CancellationToken,
}

impl SampleGenerator {
    pub fn new(source: SampleSource, sink: SharedSink, parent_token: CancellationToken) -> Self {
        Self {
            sink,
            source: Some(source),
            running: None,
            parent_token,
        }
    }

    pub fn start(&mut self) {
        if self.running.is_some() {
            warn!("Sample generator already running, ignoring start");
            return;
        }
        let Some(mut source) = self.source.take() else {
            error!("Sample generator has no source to start");
            return;
        };
        source.reset();
        info!("Starting sample generator: {}", source.describe());

        let cancel_token = self.parent_token.child_token();
        let handle = tokio::spawn(generator_thread(
            source,
            self.sink.clone(),
            cancel_token.clone(),
        ));
        self.running = Some(Running {
            cancel_token,
            handle,
        });
    }

    /// Once this returns, nothing else will be recorded until `start()` is called again.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        running.cancel_token.cancel();
        match running.handle.await {
            Ok(source) => self.source = Some(source),
            Err(e) => error!("Sample generator task failed: {e}"),
        }
        info!("Sample generator stopped");
    }

    /// False once stopped, or if a live source ran dry on its own.
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Waits for the source to run dry, or for the generator to be cancelled.
    pub async fn finished(&mut self) {
        let Some(running) = self.running.as_mut() else {
            return;
        };
        let result = tokio::select! {
            result = &mut running.handle => Some(result),
            _ = running.cancel_token.cancelled() => None,
        };
        // The handle can't be polled again once it's done
        if let Some(result) = result {
            self.running = None;
            match result {
                Ok(source) => self.source = Some(source),
                Err(e) => error!("Sample generator task failed: {e}"),
            }
        }
    }
}

impl Drop for SampleGenerator {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.cancel_token.cancel();
        }
    }
}

async fn generator_thread(
    mut source: SampleSource,
    sink: SharedSink,
    cancel_token: CancellationToken,
) -> SampleSource {
    loop {
        tokio::select! {
            sample = source.next_sample() => {
                match sample {
                    Some(sample) => sink.lock().await.record(sample),
                    None => {
                        warn!("Sample source closed, generator exiting");
                        break;
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                info!("Shutting down generator thread!");
                break;
            }
        }
    }
    source
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heart_rate::{DeviceHandle, LiveSource, SimulatedSource};
    use crate::sink::csv_store::CsvStore;
    use crate::sink::HeartbeatSink;
    use std::time::Duration;

    fn simulated(period_ms: u64) -> SampleSource {
        SimulatedSource::seeded(60..=100, Duration::from_millis(period_ms), 3).into()
    }

    #[tokio::test]
    async fn stop_halts_recording() {
        let dir = tempfile::tempdir().unwrap();
        let sink = HeartbeatSink::new(CsvStore::in_dir(dir.path())).shared();
        let mut generator =
            SampleGenerator::new(simulated(10), sink.clone(), CancellationToken::new());

        generator.start();
        assert!(generator.is_running());
        tokio::time::sleep(Duration::from_millis(120)).await;
        generator.stop().await;
        assert!(!generator.is_running());

        let recorded = sink.lock().await.len();
        assert!(recorded > 0);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(sink.lock().await.len(), recorded);

        // Restartable after a stop
        generator.start();
        tokio::time::sleep(Duration::from_millis(60)).await;
        generator.stop().await;
        assert!(sink.lock().await.len() > recorded);
    }

    #[tokio::test]
    async fn samples_recorded_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let sink = HeartbeatSink::new(CsvStore::in_dir(dir.path())).shared();
        let mut generator =
            SampleGenerator::new(simulated(5), sink.clone(), CancellationToken::new());
        generator.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        generator.stop().await;

        let sink = sink.lock().await;
        let on_disk = sink.store().read_all().unwrap();
        let values: Vec<u16> = sink.samples().iter().map(|s| s.value).collect();
        let disk_values: Vec<u16> = on_disk.iter().map(|s| s.value).collect();
        assert_eq!(values, disk_values);
        assert!(sink
            .samples()
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp));
    }

    #[tokio::test]
    async fn parent_cancel_stops_generation() {
        let dir = tempfile::tempdir().unwrap();
        let sink = HeartbeatSink::new(CsvStore::in_dir(dir.path())).shared();
        let parent_token = CancellationToken::new();
        let mut generator = SampleGenerator::new(simulated(5), sink.clone(), parent_token.clone());
        generator.start();
        parent_token.cancel();
        generator.finished().await;
        generator.stop().await;
        let recorded = sink.lock().await.len();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(sink.lock().await.len(), recorded);
    }

    #[tokio::test]
    async fn live_source_runs_dry() {
        let dir = tempfile::tempdir().unwrap();
        let sink = HeartbeatSink::new(CsvStore::in_dir(dir.path())).shared();
        let (device, tx) = DeviceHandle::channel("AA:BB".into(), None, 4);
        let mut generator = SampleGenerator::new(
            LiveSource::new(device).into(),
            sink.clone(),
            CancellationToken::new(),
        );
        generator.start();
        tx.send(crate::heart_rate::CharacteristicUpdate {
            uuid: crate::heart_rate::measurement::HEART_RATE_MEASUREMENT_CHARACTERISTIC_UUID,
            value: vec![0x06, 0x48],
        })
        .await
        .unwrap();
        drop(tx);
        generator.finished().await;
        assert!(!generator.is_running());
        generator.stop().await;

        let sink = sink.lock().await;
        assert_eq!(sink.latest().map(|s| s.value), Some(72));
    }
}
