//! Transfer progress helpers shared by both upload strategies.

use serde::Deserialize;
use std::time::{Duration, Instant};

/// Minimum time between two speed recalculations.
pub const SPEED_SAMPLE_WINDOW: Duration = Duration::from_millis(100);

/// Progress event pushed by the server over the progress channel.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProgressMessage {
    pub transferred: f64,
    pub total: f64,
    #[serde(default)]
    pub speed: Option<f64>,
}

impl ProgressMessage {
    pub fn percent(&self) -> u8 {
        percent(self.transferred, self.total)
    }
}

/// Byte-level sample reported while a request body is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSample {
    pub loaded: u64,
    pub total: u64,
}

/// Rounded percentage clamped to 0..=100. An unknown or zero total reads as 0.
pub fn percent(transferred: f64, total: f64) -> u8 {
    if !(total > 0.0) || !transferred.is_finite() {
        return 0;
    }
    (transferred / total * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Computes upload speed from byte samples, recalculating at most once per window.
///
/// Between recalculations the previous speed is reported again.
#[derive(Debug)]
pub struct SpeedSampler {
    window: Duration,
    last_loaded: u64,
    last_time: Instant,
    speed: f64,
}

impl SpeedSampler {
    pub fn new(window: Duration) -> Self {
        Self::starting_at(window, Instant::now())
    }

    pub fn starting_at(window: Duration, start: Instant) -> Self {
        Self {
            window,
            last_loaded: 0,
            last_time: start,
            speed: 0.0,
        }
    }

    pub fn sample(&mut self, loaded: u64) -> f64 {
        self.sample_at(loaded, Instant::now())
    }

    /// Returns bytes per second.
    pub fn sample_at(&mut self, loaded: u64, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_time);
        if elapsed > self.window {
            let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
            let diff = loaded.saturating_sub(self.last_loaded);
            self.speed = diff as f64 / elapsed_ms * 1000.0;
            self.last_loaded = loaded;
            self.last_time = now;
        }
        self.speed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_rounds_and_clamps() {
        assert_eq!(percent(50.0, 100.0), 50);
        assert_eq!(percent(1.0, 3.0), 33);
        assert_eq!(percent(2.0, 3.0), 67);
        assert_eq!(percent(150.0, 100.0), 100);
        assert_eq!(percent(10.0, 0.0), 0);
        assert_eq!(percent(f64::NAN, 10.0), 0);
    }

    #[test]
    fn message_parses_without_speed() {
        let msg: ProgressMessage =
            serde_json::from_str(r#"{"fileName":"a","transferred":10,"total":40}"#).unwrap();
        assert_eq!(msg.speed, None);
        assert_eq!(msg.percent(), 25);
    }

    #[test]
    fn sampler_holds_speed_inside_window() {
        let start = Instant::now();
        let mut sampler = SpeedSampler::starting_at(SPEED_SAMPLE_WINDOW, start);

        assert_eq!(sampler.sample_at(500, start + Duration::from_millis(50)), 0.0);

        let speed = sampler.sample_at(1000, start + Duration::from_millis(200));
        assert!((speed - 5000.0).abs() < 1e-6);

        // Still inside the next window: the previous value is reported.
        let held = sampler.sample_at(5000, start + Duration::from_millis(250));
        assert!((held - 5000.0).abs() < 1e-6);

        let next = sampler.sample_at(3000, start + Duration::from_millis(400));
        assert!((next - 10000.0).abs() < 1e-6);
    }
}
