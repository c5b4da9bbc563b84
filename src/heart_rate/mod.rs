pub mod generator;
pub mod live;
pub mod measurement;
pub mod simulated;

use std::ops::RangeInclusive;

use chrono::{DateTime, Local};

pub use generator::SampleGenerator;
pub use live::{CharacteristicUpdate, DeviceHandle, LiveSource};
pub use simulated::SimulatedSource;

/// Rates outside of this are still recorded, but are likely sensor noise
pub const PLAUSIBLE_BPM: RangeInclusive<u16> = 30..=220;

/// One timestamped heart rate reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatSample {
    pub timestamp: DateTime<Local>,
    pub value: u16,
}

impl HeartbeatSample {
    pub fn new(timestamp: DateTime<Local>, value: u16) -> Self {
        Self { timestamp, value }
    }

    pub fn now(value: u16) -> Self {
        Self::new(Local::now(), value)
    }

    pub fn is_plausible(&self) -> bool {
        PLAUSIBLE_BPM.contains(&self.value)
    }
}

/// Where samples come from, picked once at startup.
pub enum SampleSource {
    Simulated(SimulatedSource),
    LiveDevice(LiveSource),
}

impl SampleSource {
    /// Waits for the next sample.
    ///
    /// Returns `None` once the source can't produce anything else
    /// (only possible for live devices whose notification channel closed).
    ///
    /// Cancel safe, so it can be raced against a shutdown token.
    pub async fn next_sample(&mut self) -> Option<HeartbeatSample> {
        match self {
            SampleSource::Simulated(source) => Some(source.next_sample().await),
            SampleSource::LiveDevice(source) => source.next_sample().await,
        }
    }

    /// Called right before generation (re)starts.
    fn reset(&mut self) {
        if let SampleSource::Simulated(source) = self {
            source.reset();
        }
    }

    pub fn describe(&self) -> String {
        match self {
            SampleSource::Simulated(source) => format!(
                "Simulated ({}..={} BPM)",
                source.range().start(),
                source.range().end()
            ),
            SampleSource::LiveDevice(source) => format!("Live ({})", source.device()),
        }
    }
}

impl From<SimulatedSource> for SampleSource {
    fn from(source: SimulatedSource) -> Self {
        SampleSource::Simulated(source)
    }
}

impl From<LiveSource> for SampleSource {
    fn from(source: LiveSource) -> Self {
        SampleSource::LiveDevice(source)
    }
}
