use std::future::pending;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::args::{CollectCmd, StatsCmd, SubCommands, TopLevelCmd};
use crate::collection::{collect_session, share};
use crate::errors::AppError;
use crate::heart_rate::{DeviceHandle, LiveSource, SampleGenerator, SampleSource, SimulatedSource};
use crate::readout::readout_thread;
use crate::scan::{ble_notification_thread, scan_devices, DeviceSelector};
use crate::settings::Settings;
use crate::sink::csv_store::CsvStore;
use crate::sink::stats::RollingStatistics;
use crate::sink::{HeartbeatSink, SharedSink};

const NOTIFICATION_CHANNEL_CAPACITY: usize = 32;
const COLLECTION_TICK: Duration = Duration::from_secs(1);

pub struct App {
    pub settings: Settings,
    pub config_path: PathBuf,
    pub store: CsvStore,
    pub sink: SharedSink,
    pub cancel_app: CancellationToken,
}

/// A running BLE connection feeding a `LiveSource`
struct LiveConnection {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl LiveConnection {
    async fn close(self) {
        self.cancel_token.cancel();
        if let Err(e) = self.handle.await {
            error!("BLE notification thread failed: {e}");
        }
    }
}

impl App {
    pub fn build(
        arg_config: &TopLevelCmd,
        working_dir: &Path,
        parent_token: CancellationToken,
    ) -> Result<Self, AppError> {
        let config_path = arg_config
            .config_override
            .clone()
            .unwrap_or_else(|| working_dir.join(format!("{}.toml", env!("CARGO_PKG_NAME"))));
        let settings = Settings::load(&config_path, arg_config.config_required)?;
        if !arg_config.no_save {
            // Leaves a filled out config for the user to edit
            settings.save(&config_path)?;
        }
        let store = CsvStore::new(settings.csv_path(working_dir));
        Ok(Self {
            settings,
            config_path,
            sink: HeartbeatSink::new(store.clone()).shared(),
            store,
            cancel_app: parent_token,
        })
    }

    pub async fn run(&self, subcommand: Option<&SubCommands>) -> Result<(), AppError> {
        match subcommand {
            None => self.run_pipeline(self.simulated_source(), None).await,
            Some(SubCommands::Simulate(cmd)) => {
                let duration = cmd.duration.map(Duration::from_secs);
                self.run_pipeline(self.simulated_source(), duration).await
            }
            Some(SubCommands::Live(cmd)) => {
                let (source, connection) = self.live_source(cmd.device.as_deref()).await?;
                let duration = cmd.duration.map(Duration::from_secs);
                let result = self.run_pipeline(source, duration).await;
                connection.close().await;
                result
            }
            Some(SubCommands::Scan(cmd)) => {
                let seconds = cmd.seconds.unwrap_or(self.settings.live.scan_secs);
                self.scan(Duration::from_secs(seconds)).await
            }
            Some(SubCommands::Collect(cmd)) => self.collect(cmd).await,
            Some(SubCommands::Stats(cmd)) => self.print_stats(cmd),
        }
    }

    fn simulated_source(&self) -> SampleSource {
        SimulatedSource::from_settings(&self.settings.generator).into()
    }

    async fn live_source(
        &self,
        device: Option<&str>,
    ) -> Result<(SampleSource, LiveConnection), AppError> {
        let query = device.unwrap_or(self.settings.live.device.as_str());
        let selector = DeviceSelector::new(query).ok_or_else(|| {
            AppError::InvalidConfig("No device selected, use --device or set live.device".into())
        })?;
        let scan_length = Duration::from_secs(self.settings.live.scan_secs);
        let devices = scan_devices(scan_length, Some(&selector), self.cancel_app.clone()).await?;
        let device = selector
            .pick(&devices)
            .cloned()
            .ok_or_else(|| AppError::DeviceNotFound(query.to_owned()))?;
        info!("Selected device: {device}");

        let (handle, tx) = DeviceHandle::channel(
            device.id.clone(),
            device.name.clone(),
            NOTIFICATION_CHANNEL_CAPACITY,
        );
        let cancel_token = self.cancel_app.child_token();
        let no_packet_timeout = Duration::from_secs(self.settings.live.no_packet_timeout_secs);
        let handle_task = tokio::spawn(ble_notification_thread(
            device,
            tx,
            no_packet_timeout,
            cancel_token.clone(),
        ));
        Ok((
            LiveSource::new(handle).into(),
            LiveConnection {
                cancel_token,
                handle: handle_task,
            },
        ))
    }

    /// Spawns the readout and starts generating, returning both so they can be shut down.
    async fn start_generating(&self, source: SampleSource) -> (SampleGenerator, CancellationToken) {
        let readout_token = self.cancel_app.child_token();
        let update_rx = self.sink.lock().await.subscribe();
        tokio::spawn(readout_thread(
            update_rx,
            self.sink.clone(),
            self.settings.statistics.window_size,
            readout_token.clone(),
        ));

        let mut generator =
            SampleGenerator::new(source, self.sink.clone(), self.cancel_app.child_token());
        generator.start();
        (generator, readout_token)
    }

    /// Generates until `duration` passes, the source runs dry, or the app is cancelled.
    pub async fn run_pipeline(
        &self,
        source: SampleSource,
        duration: Option<Duration>,
    ) -> Result<(), AppError> {
        let (mut generator, readout_token) = self.start_generating(source).await;
        let time_limit = async {
            match duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => pending().await,
            }
        };
        tokio::select! {
            _ = time_limit => info!("Time limit reached"),
            _ = generator.finished() => warn!("Sample source stopped"),
            _ = self.cancel_app.cancelled() => info!("Stopping pipeline"),
        }
        generator.stop().await;
        readout_token.cancel();

        let sink = self.sink.lock().await;
        info!(
            "Recorded {} samples to {}",
            sink.len(),
            sink.store().path().display()
        );
        Ok(())
    }

    async fn collect(&self, cmd: &CollectCmd) -> Result<(), AppError> {
        let (source, connection) = match cmd.device.as_deref() {
            Some(device) => {
                let (source, connection) = self.live_source(Some(device)).await?;
                (source, Some(connection))
            }
            None => (self.simulated_source(), None),
        };
        let seconds = cmd.seconds.unwrap_or(self.settings.collection.duration_secs);
        let (mut generator, readout_token) = self.start_generating(source).await;

        let result = collect_session(
            self.sink.clone(),
            seconds,
            COLLECTION_TICK,
            self.cancel_app.child_token(),
        )
        .await;

        generator.stop().await;
        readout_token.cancel();
        if let Some(connection) = connection {
            connection.close().await;
        }

        let report = result?;
        println!(
            "Collected {} entries into {}",
            report.collected,
            report.path.display()
        );
        let open = cmd.open || self.settings.collection.open_when_done;
        share(&report, cmd.output.as_deref(), open)
    }

    async fn scan(&self, duration: Duration) -> Result<(), AppError> {
        let devices = scan_devices(duration, None, self.cancel_app.clone()).await?;
        if devices.is_empty() {
            println!("No devices found");
        }
        for device in devices {
            println!("{device}");
        }
        Ok(())
    }

    fn print_stats(&self, cmd: &StatsCmd) -> Result<(), AppError> {
        let window_size = cmd.window.unwrap_or(self.settings.statistics.window_size);
        let samples = self.store.read_all()?;
        let stats = RollingStatistics::from_trailing(&samples, window_size);
        if cmd.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            return Ok(());
        }
        println!(
            "{} readings in {}",
            samples.len(),
            self.store.path().display()
        );
        match stats {
            Some(stats) => {
                println!("Mean: {:.2} BPM", stats.mean);
                println!("Standard Deviation: {:.2} BPM", stats.standard_deviation);
                println!("Max: {} BPM", stats.max);
                println!("Min: {} BPM", stats.min);
            }
            None => println!("Not enough data to compute statistics"),
        }
        Ok(())
    }
}
