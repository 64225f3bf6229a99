use super::{MediaSource, SeekOutcome};
use anyhow::{anyhow, Context, Result};
use ffmpeg_next::ffi;
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::types::Resolution;

/// Epsilon for "decoded far enough" checks, well below one frame period.
const SEEK_EPSILON: f64 = 1e-3;

/// Video source backed by FFmpeg via ffmpeg-next. Software decoding only;
/// every decoded frame is converted to RGB24 and kept as the current
/// capture target until the next decode.
pub struct FfmpegSource {
    input_ctx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::codec::decoder::Video,
    video_stream_index: usize,
    /// Seconds per pts unit of the video stream.
    time_base: f64,
    /// Container duration in seconds, captured at open. `None` when the
    /// container reports nothing usable.
    container_duration: Option<f64>,
    /// Lazily created on first frame (source format is only known then).
    scaler: Option<ffmpeg_next::software::scaling::Context>,
    resolution: Resolution,
    byte_size: u64,
    /// Last decoded frame, already converted to RGB.
    current: Option<RgbImage>,
    position_secs: f64,
    /// Persistent packet object to avoid allocations.
    reuse_packet: ffmpeg_next::codec::packet::Packet,
    /// Whether we've sent EOF to the decoder.
    eof_sent: bool,
    path: PathBuf,
}

// SAFETY: FfmpegSource is only ever used from the single sampling worker.
// The raw pointers inside ffmpeg-next types are not shared across threads.
unsafe impl Send for FfmpegSource {}

impl FfmpegSource {
    pub fn open(path: &Path) -> Result<Self> {
        ffmpeg_next::init().context("Failed to initialize FFmpeg")?;

        if !path.exists() {
            return Err(anyhow!("Video file not found: {}", path.display()));
        }
        let byte_size = std::fs::metadata(path)
            .with_context(|| format!("Failed to stat {}", path.display()))?
            .len();

        let input_ctx =
            ffmpeg_next::format::input(&path).context("Failed to open video file")?;

        let video_stream = input_ctx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| anyhow!("No video stream found in {}", path.display()))?;
        let video_stream_index = video_stream.index();

        let tb = video_stream.time_base();
        let time_base = if tb.denominator() > 0 {
            tb.numerator() as f64 / tb.denominator() as f64
        } else {
            tracing::warn!("FfmpegSource: stream has no time base, assuming 1/1000");
            1.0 / 1000.0
        };

        // Container duration first, stream duration second. Either can be
        // missing or zero on badly muxed files.
        let container_duration = {
            let ctx_dur = input_ctx.duration();
            let from_ctx = if ctx_dur > 0 {
                Some(ctx_dur as f64 / f64::from(ffi::AV_TIME_BASE))
            } else {
                None
            };
            let stream_dur = video_stream.duration();
            from_ctx.or(if stream_dur > 0 {
                Some(stream_dur as f64 * time_base)
            } else {
                None
            })
        };

        let decoder_ctx =
            ffmpeg_next::codec::context::Context::from_parameters(video_stream.parameters())
                .context("Failed to create decoder context")?;
        let decoder = decoder_ctx
            .decoder()
            .video()
            .context("Failed to open video decoder")?;

        let (mut width, mut height) = (decoder.width(), decoder.height());
        if width == 0 || height == 0 {
            tracing::warn!("FfmpegSource: decoder reports zero dimensions, assuming 640x480");
            width = 640;
            height = 480;
        }

        tracing::info!(
            "FfmpegSource: opened {} ({}x{}, duration={:?}, {} bytes)",
            path.display(),
            width,
            height,
            container_duration,
            byte_size
        );

        Ok(Self {
            input_ctx,
            decoder,
            video_stream_index,
            time_base,
            container_duration,
            scaler: None, // created lazily on first frame
            resolution: Resolution { width, height },
            byte_size,
            current: None,
            position_secs: 0.0,
            reuse_packet: ffmpeg_next::codec::packet::Packet::empty(),
            eof_sent: false,
            path: path.to_path_buf(),
        })
    }

    fn get_or_create_scaler(
        &mut self,
        src_format: ffmpeg_next::format::Pixel,
    ) -> Result<&mut ffmpeg_next::software::scaling::Context> {
        if self.scaler.is_none() {
            let scaler = ffmpeg_next::software::scaling::Context::get(
                src_format,
                self.resolution.width,
                self.resolution.height,
                ffmpeg_next::format::Pixel::RGB24,
                self.resolution.width,
                self.resolution.height,
                ffmpeg_next::software::scaling::Flags::BILINEAR,
            )
            .context("Failed to create scaler")?;
            self.scaler = Some(scaler);
        }
        Ok(self.scaler.as_mut().unwrap())
    }

    /// Decode the next frame and make it the current capture target.
    /// Returns its timestamp in seconds, or `None` at end of stream.
    fn decode_next(&mut self) -> Result<Option<f64>> {
        let mut frame = ffmpeg_next::util::frame::Video::empty();
        loop {
            match self.decoder.receive_frame(&mut frame) {
                Ok(()) => break,
                Err(ffmpeg_next::Error::Other { errno: ffi::EAGAIN }) if !self.eof_sent => {
                    // Feed packets until we find a video packet or hit EOF.
                    let mut found_packet = false;
                    while self.reuse_packet.read(&mut self.input_ctx).is_ok() {
                        if self.reuse_packet.stream() == self.video_stream_index {
                            self.decoder
                                .send_packet(&self.reuse_packet)
                                .context("Failed to send packet to decoder")?;
                            found_packet = true;
                            break;
                        }
                    }
                    if !found_packet {
                        self.decoder
                            .send_eof()
                            .context("Failed to send EOF to decoder")?;
                        self.eof_sent = true;
                    }
                }
                Err(ffmpeg_next::Error::Other { errno: ffi::EAGAIN })
                | Err(ffmpeg_next::Error::Eof) => return Ok(None),
                Err(e) => return Err(anyhow!("Decoder error: {}", e)),
            }
        }

        let secs = frame
            .pts()
            .map(|pts| pts as f64 * self.time_base)
            .unwrap_or(self.position_secs);
        let rgb = self.frame_to_rgb(&frame)?;
        self.current = Some(rgb);
        self.position_secs = secs;
        Ok(Some(secs))
    }

    /// Convert a decoded frame to an owned `RgbImage`. The copy is
    /// required: the frame buffer is reused on the next decode.
    fn frame_to_rgb(&mut self, frame: &ffmpeg_next::util::frame::Video) -> Result<RgbImage> {
        let scaler = self.get_or_create_scaler(frame.format())?;
        let mut rgb_frame = ffmpeg_next::util::frame::Video::empty();
        scaler.run(frame, &mut rgb_frame).context("Scaler failed")?;

        let width = rgb_frame.width() as usize;
        let height = rgb_frame.height() as usize;
        let data = rgb_frame.data(0);
        let stride = rgb_frame.stride(0);

        let mut buf = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            let row = &data[y * stride..y * stride + width * 3];
            buf.extend_from_slice(row);
        }

        RgbImage::from_raw(width as u32, height as u32, buf)
            .ok_or_else(|| anyhow!("Decoded frame buffer has unexpected size"))
    }
}

impl MediaSource for FfmpegSource {
    fn metadata_duration(&self) -> Option<f64> {
        self.container_duration.filter(|d| d.is_finite() && *d > 0.0)
    }

    fn byte_size(&self) -> u64 {
        self.byte_size
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn seek(&mut self, seconds: f64, budget: Duration) -> Result<SeekOutcome> {
        let deadline = Instant::now() + budget;
        let target = seconds.max(0.0);
        let timestamp = (target * f64::from(ffi::AV_TIME_BASE)).min(i64::MAX as f64) as i64;

        if let Err(e) = self.input_ctx.seek(timestamp, ..timestamp) {
            // Targets past the end of some containers are rejected outright;
            // report a timeout so the caller proceeds with current state.
            tracing::debug!("FfmpegSource: container seek to {:.2}s failed: {}", target, e);
            return Ok(SeekOutcome::TimedOut);
        }
        self.decoder.flush();
        // The pixel format can change across a seek; rebuild the scaler
        // from the next decoded frame.
        self.scaler = None;
        self.eof_sent = false;

        // The container lands on the keyframe at or before the target;
        // decode forward until we reach it, run out of stream (clamped
        // seek) or run out of budget.
        loop {
            if Instant::now() >= deadline {
                tracing::debug!("FfmpegSource: seek to {:.2}s exceeded budget", target);
                return Ok(SeekOutcome::TimedOut);
            }
            match self.decode_next()? {
                Some(pts_secs) => {
                    if pts_secs + SEEK_EPSILON >= target {
                        return Ok(SeekOutcome::Completed);
                    }
                }
                None => return Ok(SeekOutcome::Completed),
            }
        }
    }

    fn position(&self) -> f64 {
        self.position_secs
    }

    fn capture(&mut self) -> Result<RgbImage> {
        if self.current.is_none() {
            // Nothing decoded yet: pull one frame from the current cursor.
            self.decode_next()?;
        }
        self.current
            .clone()
            .ok_or_else(|| anyhow!("No decodable frame in {}", self.path.display()))
    }

    fn release(&mut self) {
        self.current = None;
        self.scaler = None;
    }
}
