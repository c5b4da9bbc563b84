use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::heart_rate::HeartbeatSample;
use crate::sink::csv_store::CsvStore;
use crate::sink::SharedSink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionReport {
    pub collected: usize,
    pub path: PathBuf,
}

/// Snapshots the latest reading once per `tick` for `seconds` ticks,
/// then persists everything that was buffered in one go.
///
/// Ticks before the sink has any reading are skipped.
/// Cancelling throws the buffer away.
pub async fn collect_session(
    sink: SharedSink,
    seconds: u32,
    tick: Duration,
    cancel_token: CancellationToken,
) -> Result<CollectionReport, AppError> {
    info!("Collecting data for {seconds} ticks");
    let mut interval = time::interval_at(Instant::now() + tick, tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut buffer: Vec<HeartbeatSample> = Vec::new();
    let mut remaining = seconds;
    while remaining > 0 {
        tokio::select! {
            _ = interval.tick() => {
                remaining -= 1;
                let latest = sink.lock().await.latest().map(|s| s.value);
                match latest {
                    Some(value) => buffer.push(HeartbeatSample::now(value)),
                    None => debug!("No reading yet, skipping collection tick"),
                }
            }
            _ = cancel_token.cancelled() => {
                warn!("Collection cancelled, discarding {} entries", buffer.len());
                return Err(AppError::CollectionCancelled);
            }
        }
    }

    let sink = sink.lock().await;
    for sample in &buffer {
        sink.persist(sample);
    }
    info!("Data saved to CSV, {} entries", buffer.len());

    Ok(CollectionReport {
        collected: buffer.len(),
        path: sink.store().path().to_path_buf(),
    })
}

/// Hands the finished CSV off, copying it to `output` and/or opening it with the system's handler.
pub fn share(report: &CollectionReport, output: Option<&Path>, open: bool) -> Result<(), AppError> {
    let store = CsvStore::new(&report.path);
    if !store.exists() {
        return Err(AppError::MissingFile(report.path.clone()));
    }
    if let Some(output) = output {
        let bytes = store.export_to(output)?;
        info!("Copied CSV to {} ({bytes} bytes)", output.display());
    }
    if open {
        opener::open(&report.path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::HeartbeatSink;

    #[tokio::test]
    async fn persists_each_buffered_tick() {
        let dir = tempfile::tempdir().unwrap();
        let sink = HeartbeatSink::new(CsvStore::in_dir(dir.path())).shared();
        sink.lock().await.record(HeartbeatSample::now(88));

        let report = collect_session(
            sink.clone(),
            3,
            Duration::from_millis(5),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.collected, 3);
        let on_disk = sink.lock().await.store().read_all().unwrap();
        // One from record, three from the session
        assert_eq!(on_disk.len(), 4);
        assert!(on_disk.iter().all(|s| s.value == 88));
        // Collection doesn't touch the in-memory log
        assert_eq!(sink.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn skips_ticks_without_readings() {
        let dir = tempfile::tempdir().unwrap();
        let sink = HeartbeatSink::new(CsvStore::in_dir(dir.path())).shared();
        let report = collect_session(
            sink.clone(),
            2,
            Duration::from_millis(5),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(report.collected, 0);
        assert!(matches!(share(&report, None, false), Err(AppError::MissingFile(_))));
    }

    #[tokio::test]
    async fn cancel_discards_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let sink = HeartbeatSink::new(CsvStore::new(dir.path().join("cancelled.csv"))).shared();
        // Log needs a reading for ticks to buffer anything
        sink.lock().await.record(HeartbeatSample::now(71));
        let before = sink.lock().await.store().read_all().unwrap().len();

        let token = CancellationToken::new();
        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                // Several 5ms ticks land in the buffer first
                tokio::time::sleep(Duration::from_millis(40)).await;
                token.cancel();
            })
        };
        let result = collect_session(sink.clone(), 1_000, Duration::from_millis(5), token).await;
        canceller.await.unwrap();

        assert!(matches!(result, Err(AppError::CollectionCancelled)));
        assert_eq!(sink.lock().await.store().read_all().unwrap().len(), before);
    }

    #[tokio::test]
    async fn huge_session_cancels_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let sink = HeartbeatSink::new(CsvStore::in_dir(dir.path())).shared();
        let token = CancellationToken::new();
        token.cancel();
        let result =
            collect_session(sink, u32::MAX, Duration::from_millis(5), token).await;
        assert!(matches!(result, Err(AppError::CollectionCancelled)));
    }

    #[test]
    fn share_copies_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::in_dir(dir.path());
        store.append(&HeartbeatSample::now(64)).unwrap();
        let report = CollectionReport {
            collected: 1,
            path: store.path().to_path_buf(),
        };
        let output = dir.path().join("shared.csv");
        share(&report, Some(&output), false).unwrap();
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            std::fs::read_to_string(store.path()).unwrap()
        );
    }
}
