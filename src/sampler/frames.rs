use anyhow::Result;

use crate::media::{MediaSource, SeekOutcome};
use crate::sampler::duration::resolve_duration;
use crate::sampler::thumbnail::encode_thumbnail;
use crate::sampler::{SampleProgress, SamplerConfig};
use crate::types::{FrameData, ProcessedVideoData};

/// Drive sequential seeks over the source and capture one thumbnail per
/// sample point. Always yields at least one frame; individual capture
/// failures are logged and skipped. The source is released exactly once,
/// on both success and failure paths.
pub fn sample_video(
    source: &mut dyn MediaSource,
    config: &SamplerConfig,
    progress: &SampleProgress,
) -> Result<ProcessedVideoData> {
    let result = sample_inner(source, config, progress);
    source.release();
    result
}

fn sample_inner(
    source: &mut dyn MediaSource,
    config: &SamplerConfig,
    progress: &SampleProgress,
) -> Result<ProcessedVideoData> {
    progress.set_percent(5);

    let resolved = resolve_duration(source, config);
    let duration = resolved.seconds;
    tracing::info!("Resolved duration {:.2}s via {:?}", duration, resolved.method);
    progress.set_percent(20);

    // The probe leaves the cursor near the end; start sampling from 0.
    if let Err(e) = source.seek(0.0, config.seek_timeout) {
        tracing::warn!("Reset seek to 0 failed: {e:#}");
    }
    let resolution = source.resolution();
    progress.set_percent(30);

    // Even spacing: the last sample lands at or before `duration`.
    let frame_count = ((duration / config.interval_secs).ceil() as usize).max(1);
    let frame_interval = duration / frame_count as f64;
    tracing::debug!("Sampling {} frames every {:.2}s", frame_count, frame_interval);

    let mut frames: Vec<FrameData> = Vec::with_capacity(frame_count);
    for i in 0..frame_count {
        progress.set_percent(30 + ((i * 60) / frame_count) as u8);
        let timestamp = i as f64 * frame_interval;

        match source.seek(timestamp, config.seek_timeout) {
            Ok(SeekOutcome::Completed) => {}
            Ok(SeekOutcome::TimedOut) => {
                tracing::debug!("Seek to {timestamp:.2}s timed out, using current frame")
            }
            // Still worth a capture: whatever is decoded may be usable.
            Err(e) => tracing::warn!("Seek to {timestamp:.2}s failed: {e:#}"),
        }

        match capture_sample(source, i, timestamp, config) {
            Ok(frame) => frames.push(frame),
            Err(e) => tracing::warn!("Skipping sample {i} at {timestamp:.2}s: {e:#}"),
        }
    }

    if frames.is_empty() {
        tracing::warn!("No frames captured, attempting a last-resort frame at 0s");
        frames.push(last_resort_frame(source, config));
    }
    progress.set_percent(90);

    Ok(ProcessedVideoData {
        frames,
        duration,
        resolution,
    })
}

fn capture_sample(
    source: &mut dyn MediaSource,
    index: usize,
    timestamp: f64,
    config: &SamplerConfig,
) -> Result<FrameData> {
    let image = source.capture()?;
    let thumbnail = encode_thumbnail(&image, config.thumbnail_width, config.jpeg_quality)?;
    Ok(FrameData::new(index, timestamp, thumbnail))
}

/// Callers must always receive at least one frame: try once more at 0s
/// with a short wait, and fall back to a degenerate empty-thumbnail frame
/// if even that fails.
fn last_resort_frame(source: &mut dyn MediaSource, config: &SamplerConfig) -> FrameData {
    if let Err(e) = source.seek(0.0, config.last_resort_wait) {
        tracing::warn!("Last-resort seek failed: {e:#}");
    }
    match capture_sample(source, 0, 0.0, config) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::error!("Failed to capture even a single frame: {e:#}");
            FrameData::new(0, 0.0, String::new())
        }
    }
}
