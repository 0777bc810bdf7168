//! Progress reporting: rate is an exponential moving average over the
//! last ~30s of ticks, ETA is `(total - processed) / rate` clamped to
//! `[0, inf)` and reported as `0` when the rate is not yet known (§4.7).

use std::time::Instant;

const EMA_TIME_CONSTANT_SECS: f64 = 30.0;

#[derive(Debug, Clone)]
pub struct ProgressTick {
    pub processed: u64,
    pub total: u64,
    pub rate_per_sec: f64,
    pub eta_seconds: f64,
    pub message: String,
}

/// Tracks processed-count history for one job and smooths the
/// instantaneous rate into an EMA so a slow tick doesn't spike the ETA.
#[derive(Debug)]
pub struct RateTracker {
    started_at: Instant,
    last_tick_at: Option<Instant>,
    last_processed: u64,
    ema_rate_per_sec: f64,
}

impl Default for RateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RateTracker {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            last_tick_at: None,
            last_processed: 0,
            ema_rate_per_sec: 0.0,
        }
    }

    /// Restores a tracker resumed from a checkpoint (§4.5), so the rate
    /// isn't recomputed from a cold start against wall-clock-since-process-boot.
    pub fn resume(processed_so_far: u64, rate_per_sec: f64) -> Self {
        Self {
            started_at: Instant::now(),
            last_tick_at: None,
            last_processed: processed_so_far,
            ema_rate_per_sec: rate_per_sec.max(0.0),
        }
    }

    pub fn tick(&mut self, processed: u64, total: u64, message: impl Into<String>) -> ProgressTick {
        let now = Instant::now();

        if let Some(last) = self.last_tick_at {
            let dt = (now - last).as_secs_f64();
            if dt > 0.0 {
                let delta = processed.saturating_sub(self.last_processed);
                let instantaneous = delta as f64 / dt;
                let decay = (-dt / EMA_TIME_CONSTANT_SECS).exp();
                self.ema_rate_per_sec = self.ema_rate_per_sec * decay + instantaneous * (1.0 - decay);
            }
        }

        self.last_tick_at = Some(now);
        self.last_processed = processed;

        let eta_seconds = if self.ema_rate_per_sec > 0.0 {
            ((total.saturating_sub(processed)) as f64 / self.ema_rate_per_sec).max(0.0)
        } else {
            0.0
        };

        ProgressTick {
            processed,
            total,
            rate_per_sec: self.ema_rate_per_sec,
            eta_seconds,
            message: message.into(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn eta_is_zero_until_rate_known() {
        let mut tracker = RateTracker::new();
        let tick = tracker.tick(0, 100, "starting");
        assert_eq!(tick.eta_seconds, 0.0);
        assert_eq!(tick.rate_per_sec, 0.0);
    }

    #[test]
    fn rate_and_eta_follow_progress() {
        let mut tracker = RateTracker::new();
        tracker.tick(0, 100, "");
        sleep(Duration::from_millis(50));
        let tick = tracker.tick(10, 100, "");
        assert!(tick.rate_per_sec > 0.0);
        assert!(tick.eta_seconds > 0.0);
    }

    #[test]
    fn resumed_tracker_keeps_seed_rate() {
        let mut tracker = RateTracker::resume(50, 5.0);
        let tick = tracker.tick(50, 100, "resumed");
        assert_eq!(tick.processed, 50);
        assert!((tick.rate_per_sec - 5.0).abs() < 0.001);
    }
}
