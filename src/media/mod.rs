pub mod ffmpeg_source;

use anyhow::Result;
use image::RgbImage;
use std::time::Duration;

use crate::types::Resolution;

/// Result of a bounded seek. A timed-out seek leaves the source in its
/// best available state (whatever frame was last decoded); callers
/// proceed with that rather than blocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOutcome {
    Completed,
    TimedOut,
}

/// A playable video source the sampler can drive. This is the seam
/// between the sampling logic and a concrete decoder backend.
pub trait MediaSource: Send {
    /// Duration from container metadata, in seconds. `None` when the
    /// container does not report one or reports a non-finite value.
    fn metadata_duration(&self) -> Option<f64>;

    /// Size of the underlying file in bytes, for the bitrate estimate.
    fn byte_size(&self) -> u64;

    /// Native decode dimensions.
    fn resolution(&self) -> Resolution;

    /// Reposition the playback cursor to `seconds` and decode up to it,
    /// spending at most `budget` wall-clock time. A target beyond the end
    /// of the source clamps to the last decodable frame.
    fn seek(&mut self, seconds: f64, budget: Duration) -> Result<SeekOutcome>;

    /// Current decoded position in seconds. After a clamped seek this is
    /// the position the container actually landed on.
    fn position(&self) -> f64;

    /// The currently decoded frame. Errors only when nothing has been
    /// decoded at all.
    fn capture(&mut self) -> Result<RgbImage>;

    /// Drop transient decode state. Idempotent; called exactly once per
    /// sampling run on both success and failure paths.
    fn release(&mut self);
}

#[cfg(test)]
pub mod mock {
    use super::*;

    /// Scripted source for sampler and duration-resolver tests.
    pub struct MockSource {
        /// What the container metadata reports up front.
        pub metadata: Option<f64>,
        /// Metadata surfaced only after a clamped seek to the end, the way
        /// unreliable containers behave. `None` keeps metadata unchanged.
        pub metadata_after_probe: Option<f64>,
        /// The real length the cursor clamps against.
        pub clamp_at: f64,
        pub bytes: u64,
        pub res: Resolution,
        pub seek_outcome: SeekOutcome,
        /// Capture calls (0-based) that should fail.
        pub failing_captures: Vec<usize>,
        pub fail_all_captures: bool,

        pub position: f64,
        pub seeks: Vec<f64>,
        pub captures: usize,
        pub releases: usize,
    }

    impl MockSource {
        pub fn new(metadata: Option<f64>, clamp_at: f64) -> Self {
            Self {
                metadata,
                metadata_after_probe: None,
                clamp_at,
                bytes: 0,
                res: Resolution {
                    width: 64,
                    height: 48,
                },
                seek_outcome: SeekOutcome::Completed,
                failing_captures: Vec::new(),
                fail_all_captures: false,
                position: 0.0,
                seeks: Vec::new(),
                captures: 0,
                releases: 0,
            }
        }
    }

    impl MediaSource for MockSource {
        fn metadata_duration(&self) -> Option<f64> {
            self.metadata.filter(|d| d.is_finite() && *d > 0.0)
        }

        fn byte_size(&self) -> u64 {
            self.bytes
        }

        fn resolution(&self) -> Resolution {
            self.res
        }

        fn seek(&mut self, seconds: f64, _budget: Duration) -> Result<SeekOutcome> {
            self.seeks.push(seconds);
            if seconds > self.clamp_at {
                self.position = self.clamp_at;
                if let Some(d) = self.metadata_after_probe {
                    self.metadata = Some(d);
                }
            } else {
                self.position = seconds.max(0.0);
            }
            Ok(self.seek_outcome)
        }

        fn position(&self) -> f64 {
            self.position
        }

        fn capture(&mut self) -> Result<RgbImage> {
            let call = self.captures;
            self.captures += 1;
            if self.fail_all_captures || self.failing_captures.contains(&call) {
                anyhow::bail!("no decodable frame at {:.2}s", self.position);
            }
            Ok(RgbImage::from_pixel(4, 4, image::Rgb([10, 20, 30])))
        }

        fn release(&mut self) {
            self.releases += 1;
        }
    }
}
