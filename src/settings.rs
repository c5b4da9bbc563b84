use config::{Config, File as ConfigFile, FileFormat};
use serde_derive::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::filter::LevelFilter;

use crate::errors::AppError;
use crate::sink::csv_store::CSV_FILE_NAME;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct GeneratorSettings {
    pub interval_ms: u64,
    pub low_bpm: u16,
    pub high_bpm: u16,
}

impl GeneratorSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct StatisticsSettings {
    pub window_size: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct StorageSettings {
    /// Left empty to use the working directory
    pub data_dir: String,
    pub csv_file_name: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct CollectionSettings {
    pub duration_secs: u32,
    pub open_when_done: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct LiveSettings {
    /// Name or address of the Heart Rate Monitor to use
    pub device: String,
    pub scan_secs: u64,
    pub no_packet_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct MiscSettings {
    log_level: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Settings {
    pub generator: GeneratorSettings,
    pub statistics: StatisticsSettings,
    pub storage: StorageSettings,
    pub collection: CollectionSettings,
    pub live: LiveSettings,
    pub misc: MiscSettings,
}

impl Settings {
    pub fn load(config_path: &Path, required: bool) -> Result<Self, AppError> {
        let default_log_level = if cfg!(debug_assertions) {
            "debug"
        } else {
            "info"
        };

        let s = Config::builder()
            .add_source(
                ConfigFile::from(config_path)
                    .format(FileFormat::Toml)
                    .required(required),
            )
            .set_default("generator.interval_ms", 1000)?
            .set_default("generator.low_bpm", 60)?
            .set_default("generator.high_bpm", 100)?
            .set_default("statistics.window_size", 10)?
            .set_default("storage.data_dir", "")?
            .set_default("storage.csv_file_name", CSV_FILE_NAME)?
            .set_default("collection.duration_secs", 60)?
            .set_default("collection.open_when_done", false)?
            .set_default("live.device", "")?
            .set_default("live.scan_secs", 10)?
            .set_default("live.no_packet_timeout_secs", 30)?
            .set_default("misc.log_level", default_log_level)?
            .build()?;

        let settings: Settings = s.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.generator.low_bpm > self.generator.high_bpm {
            return Err(AppError::InvalidConfig(format!(
                "generator.low_bpm ({}) is above generator.high_bpm ({})",
                self.generator.low_bpm, self.generator.high_bpm
            )));
        }
        if self.generator.interval_ms == 0 {
            return Err(AppError::InvalidConfig(
                "generator.interval_ms must be above 0".into(),
            ));
        }
        if self.statistics.window_size == 0 {
            return Err(AppError::InvalidConfig(
                "statistics.window_size must be above 0".into(),
            ));
        }
        if self.storage.csv_file_name.trim().is_empty() {
            return Err(AppError::InvalidConfig(
                "storage.csv_file_name can't be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn save(&self, config_path: &Path) -> Result<(), AppError> {
        let toml_string = toml::to_string(self)?;
        std::fs::write(config_path, toml_string).map_err(|e| AppError::OpenFile {
            path: config_path.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }

    /// Full path of the heartbeat CSV, relative paths resolved against `working_dir`.
    pub fn csv_path(&self, working_dir: &Path) -> PathBuf {
        let data_dir = if self.storage.data_dir.is_empty() {
            working_dir.to_path_buf()
        } else {
            working_dir.join(&self.storage.data_dir)
        };
        data_dir.join(&self.storage.csv_file_name)
    }

    pub fn get_log_level(&self) -> LevelFilter {
        match self.misc.log_level.to_lowercase().as_str() {
            "off" => LevelFilter::OFF,
            "error" => LevelFilter::ERROR,
            "warn" => LevelFilter::WARN,
            "info" => LevelFilter::INFO,
            "debug" => LevelFilter::DEBUG,
            "trace" => LevelFilter::TRACE,
            _ => LevelFilter::INFO,
        }
    }
}
