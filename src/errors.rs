use std::path::PathBuf;

use thiserror::Error;

/// Represents all possible errors that can occur during the app's lifecycle
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to create directory \"{path}\": {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to open file \"{path}\": {source}")]
    OpenFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Error parsing config: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Bluetooth Error: {0}")]
    Bt(#[from] btleplug::Error),
    #[error("TOML Serialization Error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("JSON Serialization Error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Invalid timestamp in CSV: {0}")]
    Timestamp(#[from] chrono::ParseError),
    #[error("Failed to open file with system handler: {0}")]
    Opener(#[from] opener::OpenError),
    // My errors
    #[error("Failed to get working directory")]
    WorkDir,
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("File not found: \"{0}\"")]
    MissingFile(PathBuf),
    #[error("No Bluetooth adapters found")]
    NoAdapter,
    #[error("No device matching \"{0}\" was found")]
    DeviceNotFound(String),
    #[error("Device is missing the Heart Rate Measurement characteristic")]
    MissingHrCharacteristic,
    #[error("Data collection was cancelled")]
    CollectionCancelled,
}
