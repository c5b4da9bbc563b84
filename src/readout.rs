use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver as BReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::heart_rate::HeartbeatSample;
use crate::sink::stats::RollingStatistics;
use crate::sink::{SharedSink, SinkUpdate};

/// Formats the one-line readout shown after each new sample
pub fn format_readout(
    latest: &HeartbeatSample,
    stats: Option<&RollingStatistics>,
    chart: &[HeartbeatSample],
) -> String {
    let stats = match stats {
        Some(stats) => format!(
            "mean {:.2} | std {:.2} | max {} | min {}",
            stats.mean, stats.standard_deviation, stats.max, stats.min
        ),
        None => "not enough data for statistics".into(),
    };
    let chart = chart
        .iter()
        .map(|s| s.value.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "{} | {:>3} BPM | {stats} | [{chart}]",
        latest.timestamp.format("%H:%M:%S"),
        latest.value
    )
}

/// Prints a readout to stdout for every recorded sample until cancelled.
pub async fn readout_thread(
    mut update_rx: BReceiver<SinkUpdate>,
    sink: SharedSink,
    window_size: usize,
    cancel_token: CancellationToken,
) {
    info!("Readout thread started!");
    loop {
        tokio::select! {
            update = update_rx.recv() => {
                match update {
                    Ok(SinkUpdate::SampleRecorded(sample)) => {
                        let line = {
                            let sink = sink.lock().await;
                            format_readout(
                                &sample,
                                sink.statistics(window_size).as_ref(),
                                sink.tail(window_size),
                            )
                        };
                        println!("{line}");
                    }
                    Ok(SinkUpdate::PersistFailed(e)) => {
                        eprintln!("Couldn't save reading to CSV: {e}");
                    }
                    Ok(SinkUpdate::LogChanged { .. }) => {}
                    Err(RecvError::Closed) => {
                        error!("Readout: Channel closed");
                        return;
                    }
                    Err(RecvError::Lagged(count)) => {
                        warn!("Readout: Lagged! Missed {count} messages");
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                info!("Readout thread shutting down");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};

    #[test]
    fn readout_with_and_without_stats() {
        let timestamp = Local.with_ymd_and_hms(2024, 5, 1, 9, 5, 7).unwrap();
        let latest = HeartbeatSample::new(timestamp, 72);
        let chart = [HeartbeatSample::new(timestamp, 70), latest];

        assert_eq!(
            format_readout(&latest, None, &chart),
            "09:05:07 |  72 BPM | not enough data for statistics | [70 72]"
        );

        let stats = RollingStatistics {
            mean: 80.0,
            standard_deviation: 14.142135,
            max: 100,
            min: 60,
        };
        assert_eq!(
            format_readout(&latest, Some(&stats), &chart),
            "09:05:07 |  72 BPM | mean 80.00 | std 14.14 | max 100 | min 60 | [70 72]"
        );
    }
}
