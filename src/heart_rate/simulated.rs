use std::ops::RangeInclusive;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use super::HeartbeatSample;
use crate::settings::GeneratorSettings;

/// Produces a uniformly random reading once per interval.
pub struct SimulatedSource {
    range: RangeInclusive<u16>,
    period: Duration,
    // Built on first use so sources can be made outside of a runtime
    interval: Option<Interval>,
    rng: StdRng,
}

impl SimulatedSource {
    pub fn new(range: RangeInclusive<u16>, period: Duration) -> Self {
        Self::with_rng(range, period, StdRng::from_entropy())
    }

    /// Same readings every run, for tests
    pub fn seeded(range: RangeInclusive<u16>, period: Duration, seed: u64) -> Self {
        Self::with_rng(range, period, StdRng::seed_from_u64(seed))
    }

    fn with_rng(range: RangeInclusive<u16>, period: Duration, rng: StdRng) -> Self {
        Self {
            range,
            period,
            interval: None,
            rng,
        }
    }

    pub fn from_settings(settings: &GeneratorSettings) -> Self {
        Self::new(settings.low_bpm..=settings.high_bpm, settings.interval())
    }

    pub fn range(&self) -> &RangeInclusive<u16> {
        &self.range
    }

    pub fn next_value(&mut self) -> u16 {
        self.rng.gen_range(self.range.clone())
    }

    pub(super) async fn next_sample(&mut self) -> HeartbeatSample {
        let period = self.period;
        self.interval
            .get_or_insert_with(|| new_interval(period))
            .tick()
            .await;
        HeartbeatSample::now(self.next_value())
    }

    /// Pushes the next tick a full period out from now
    pub(super) fn reset(&mut self) {
        self.interval = None;
    }
}

// Unlike `time::interval`, the first tick only lands after one period
fn new_interval(period: Duration) -> Interval {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}
