pub mod duration;
pub mod frames;
pub mod thumbnail;

use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::RwLock;
use std::time::Duration;

/// Knobs for one sampling run. Defaults match the reference behavior:
/// one sample every 5 seconds, 5-second wait budgets, 320px thumbnails.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Nominal spacing between samples, in seconds.
    pub interval_secs: f64,
    /// Budget for each per-sample seek.
    pub seek_timeout: Duration,
    /// Budget for the forced-seek duration probe.
    pub probe_timeout: Duration,
    /// Floor for the byte-size duration estimate, in seconds.
    pub duration_floor_secs: f64,
    /// Assumed bitrate for the byte-size estimate.
    pub assumed_bytes_per_sec: f64,
    /// Thumbnails are downscaled to at most this width.
    pub thumbnail_width: u32,
    pub jpeg_quality: u8,
    /// Short fixed wait for the last-resort single-frame attempt.
    pub last_resort_wait: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5.0,
            seek_timeout: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(5),
            duration_floor_secs: 10.0,
            assumed_bytes_per_sec: 1024.0 * 1024.0,
            thumbnail_width: 320,
            jpeg_quality: 70,
            last_resort_wait: Duration::from_millis(500),
        }
    }
}

/// Sampling progress shared between the worker and its observers (SSE
/// handler, CLI progress bar). Observational side channel only; the
/// percentage is monotonically non-decreasing in [0, 100].
#[derive(Debug, Default)]
pub struct SampleProgress {
    percent: AtomicU8,
    is_complete: AtomicBool,
    error: RwLock<Option<String>>,
}

impl SampleProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the reported percentage. Lower values are ignored so the
    /// reading never moves backwards.
    pub fn set_percent(&self, percent: u8) {
        self.percent.fetch_max(percent.min(100), Ordering::Relaxed);
    }

    pub fn percent(&self) -> u8 {
        self.percent.load(Ordering::Relaxed)
    }

    pub fn mark_complete(&self) {
        self.set_percent(100);
        self.is_complete.store(true, Ordering::Relaxed);
    }

    pub fn mark_failed(&self, message: String) {
        if let Ok(mut error) = self.error.write() {
            *error = Some(message);
        }
        self.is_complete.store(true, Ordering::Relaxed);
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete.load(Ordering::Relaxed)
    }

    pub fn error(&self) -> Option<String> {
        self.error.read().ok().and_then(|e| e.clone())
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "percent": self.percent(),
            "is_complete": self.is_complete(),
            "error": self.error(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_never_moves_backwards() {
        let progress = SampleProgress::new();
        progress.set_percent(40);
        progress.set_percent(20);
        assert_eq!(progress.percent(), 40);
        progress.set_percent(90);
        assert_eq!(progress.percent(), 90);
    }

    #[test]
    fn percent_is_capped_at_100() {
        let progress = SampleProgress::new();
        progress.set_percent(250);
        assert_eq!(progress.percent(), 100);
    }

    #[test]
    fn failure_is_reported_as_complete_with_error() {
        let progress = SampleProgress::new();
        progress.mark_failed("boom".to_string());
        assert!(progress.is_complete());
        assert_eq!(progress.error().as_deref(), Some("boom"));
    }
}
