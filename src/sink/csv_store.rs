use chrono::{DateTime, Local, SecondsFormat};
use serde_derive::{Deserialize, Serialize};
use std::fs::{create_dir_all, OpenOptions};
use std::path::{Path, PathBuf};

use crate::errors::AppError;
use crate::heart_rate::HeartbeatSample;

pub const CSV_FILE_NAME: &str = "heartbeat_data.csv";

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    timestamp: String,
    bpm: u16,
}

impl From<&HeartbeatSample> for CsvRow {
    fn from(sample: &HeartbeatSample) -> Self {
        Self {
            timestamp: format_timestamp(&sample.timestamp),
            bpm: sample.value,
        }
    }
}

impl TryFrom<CsvRow> for HeartbeatSample {
    type Error = AppError;

    fn try_from(row: CsvRow) -> Result<Self, Self::Error> {
        let timestamp = DateTime::parse_from_rfc3339(&row.timestamp)?.with_timezone(&Local);
        Ok(HeartbeatSample::new(timestamp, row.bpm))
    }
}

/// RFC 3339 with milliseconds and a numeric offset, e.g. `2024-05-01T12:00:00.000+02:00`
pub fn format_timestamp(timestamp: &DateTime<Local>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, false)
}

/// Headerless `<timestamp>,<bpm>` file that's only ever appended to.
///
/// Assumes a single writer, nothing is locked.
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(CSV_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Creates the file with this line if it's missing, otherwise appends it at the end.
    pub fn append(&self, sample: &HeartbeatSample) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                create_dir_all(parent).map_err(|e| AppError::CreateDir {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| AppError::OpenFile {
                path: self.path.clone(),
                source: e,
            })?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(file);
        writer.serialize(CsvRow::from(sample))?;
        writer.flush()?;
        Ok(())
    }

    /// Every sample in the file, oldest first. A missing file has no samples.
    pub fn read_all(&self) -> Result<Vec<HeartbeatSample>, AppError> {
        if !self.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(&self.path)?;
        reader
            .deserialize::<CsvRow>()
            .map(|row| HeartbeatSample::try_from(row?))
            .collect()
    }

    /// Copies the file elsewhere, returning the number of bytes copied.
    pub fn export_to(&self, destination: &Path) -> Result<u64, AppError> {
        if !self.exists() {
            return Err(AppError::MissingFile(self.path.clone()));
        }
        Ok(std::fs::copy(&self.path, destination)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_at(secs: u32, value: u16) -> HeartbeatSample {
        let timestamp = Local.with_ymd_and_hms(2024, 5, 1, 12, 0, secs).unwrap();
        HeartbeatSample::new(timestamp, value)
    }

    fn lines(store: &CsvStore) -> Vec<String> {
        std::fs::read_to_string(store.path())
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn creates_then_appends() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::in_dir(dir.path());
        assert!(!store.exists());

        let (s1, s2, s3) = (sample_at(0, 72), sample_at(1, 75), sample_at(2, 80));
        store.append(&s1).unwrap();
        store.append(&s2).unwrap();

        let t1 = format_timestamp(&s1.timestamp);
        let t2 = format_timestamp(&s2.timestamp);
        assert_eq!(lines(&store), vec![format!("{t1},72"), format!("{t2},75")]);

        store.append(&s3).unwrap();
        let t3 = format_timestamp(&s3.timestamp);
        assert_eq!(
            lines(&store),
            vec![format!("{t1},72"), format!("{t2},75"), format!("{t3},80")]
        );
        assert!(std::fs::read_to_string(store.path())
            .unwrap()
            .ends_with(",80\n"));
    }

    #[test]
    fn read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("nested").join("log.csv"));
        assert!(store.read_all().unwrap().is_empty());

        let written = vec![sample_at(0, 61), sample_at(1, 99)];
        for sample in &written {
            store.append(sample).unwrap();
        }
        assert_eq!(store.read_all().unwrap(), written);
    }

    #[test]
    fn timestamp_format() {
        let sample = sample_at(5, 70);
        let formatted = format_timestamp(&sample.timestamp);
        assert!(formatted.starts_with("2024-05-01T12:00:05.000"));
        assert!(!formatted.contains(','));
    }

    #[test]
    fn export_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::in_dir(dir.path());
        let result = store.export_to(&dir.path().join("copy.csv"));
        assert!(matches!(result, Err(AppError::MissingFile(_))));
    }
}
