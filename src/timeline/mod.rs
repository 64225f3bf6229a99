pub mod clock;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::timeline::clock::PlaybackClock;
use crate::types::{FrameData, ProcessedVideoData};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Stopped,
    Playing,
}

/// One editing session: the sampled frame sequence plus the single
/// authoritative time cursor. All timeline mutation goes through this
/// type; consumers only read frame identity and attach new masks.
pub struct VideoSession {
    data: ProcessedVideoData,
    current_time: f64,
    play_state: PlayState,
    last_selected_frame_id: Option<String>,
    clock: PlaybackClock,
}

impl VideoSession {
    pub fn new(data: ProcessedVideoData, clock: PlaybackClock) -> Self {
        Self {
            data,
            current_time: 0.0,
            play_state: PlayState::Stopped,
            last_selected_frame_id: None,
            clock,
        }
    }

    pub fn data(&self) -> &ProcessedVideoData {
        &self.data
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn play_state(&self) -> PlayState {
        self.play_state
    }

    pub fn last_selected_frame_id(&self) -> Option<&str> {
        self.last_selected_frame_id.as_deref()
    }

    /// Index of the frame with the greatest timestamp at or before `time`;
    /// the first frame when `time` precedes every sample. Scanning from
    /// the end makes the choice stable for duplicated timestamps (always
    /// the latest such frame in sequence order).
    pub fn nearest_frame_index(&self, time: f64) -> Option<usize> {
        let frames = &self.data.frames;
        if frames.is_empty() {
            return None;
        }
        frames
            .iter()
            .rposition(|f| f.timestamp <= time)
            .or(Some(0))
    }

    pub fn nearest_frame(&self, time: f64) -> Option<&FrameData> {
        self.nearest_frame_index(time).map(|i| &self.data.frames[i])
    }

    /// Move the cursor directly (timeline click, marker click). Works the
    /// same in both play states. Returns the newly resolved frame only
    /// when its identity differs from the last selection, so observers
    /// never see redundant notifications.
    pub fn seek_to(&mut self, time: f64) -> Option<&FrameData> {
        self.current_time = time.clamp(0.0, self.data.duration);
        self.select_current()
    }

    pub fn play(&mut self, now: Instant) {
        if self.play_state == PlayState::Playing {
            return;
        }
        self.play_state = PlayState::Playing;
        self.clock.start(now);
    }

    pub fn pause(&mut self) {
        if self.play_state == PlayState::Stopped {
            return;
        }
        self.play_state = PlayState::Stopped;
        self.clock.stop();
    }

    /// One playback-loop step. No-op while stopped.
    pub fn tick(&mut self, now: Instant) -> Option<&FrameData> {
        if self.play_state != PlayState::Playing {
            return None;
        }
        self.current_time = self
            .clock
            .tick(self.current_time, now, self.data.duration);
        self.select_current()
    }

    /// Jump to the adjacent sampled frame, clamped to the sequence
    /// bounds, and select it explicitly.
    pub fn skip_forward(&mut self) -> Option<&FrameData> {
        self.skip(1)
    }

    pub fn skip_backward(&mut self) -> Option<&FrameData> {
        self.skip(-1)
    }

    fn skip(&mut self, direction: isize) -> Option<&FrameData> {
        let index = self.nearest_frame_index(self.current_time)?;
        let last = self.data.frames.len() - 1;
        let target = if direction > 0 {
            (index + 1).min(last)
        } else {
            index.saturating_sub(1)
        };
        let frame = &self.data.frames[target];
        self.current_time = frame.timestamp;
        self.last_selected_frame_id = Some(frame.id.clone());
        Some(&self.data.frames[target])
    }

    fn select_current(&mut self) -> Option<&FrameData> {
        let index = self.nearest_frame_index(self.current_time)?;
        let id = &self.data.frames[index].id;
        if self.last_selected_frame_id.as_deref() == Some(id.as_str()) {
            return None;
        }
        self.last_selected_frame_id = Some(id.clone());
        Some(&self.data.frames[index])
    }
}

/// Async playback driver: ticks the session at roughly display rate until
/// `cancel` flips to true. Dropping out of the loop is deterministic;
/// nothing fires after cancellation.
pub async fn run_playback<F>(
    session: Arc<Mutex<VideoSession>>,
    mut cancel: watch::Receiver<bool>,
    mut on_select: F,
) where
    F: FnMut(FrameData),
{
    let mut interval = tokio::time::interval(Duration::from_millis(16));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let selected = {
                    let mut session = session.lock().unwrap();
                    session.tick(Instant::now()).cloned()
                };
                if let Some(frame) = selected {
                    on_select(frame);
                }
            }
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Resolution, Segmentation};

    fn frame(index: usize, timestamp: f64) -> FrameData {
        FrameData {
            id: format!("frame-{index}"),
            timestamp,
            segmentation: Segmentation::default(),
            thumbnail: String::new(),
        }
    }

    fn session_with(timestamps: &[f64], duration: f64) -> VideoSession {
        let frames = timestamps
            .iter()
            .enumerate()
            .map(|(i, t)| frame(i, *t))
            .collect();
        VideoSession::new(
            ProcessedVideoData {
                frames,
                duration,
                resolution: Resolution {
                    width: 1920,
                    height: 1080,
                },
            },
            PlaybackClock::wall(),
        )
    }

    #[test]
    fn nearest_frame_picks_latest_at_or_before() {
        let session = session_with(&[0.0, 5.0, 10.0], 10.0);
        assert_eq!(session.nearest_frame(7.0).unwrap().timestamp, 5.0);
        assert_eq!(session.nearest_frame(0.0).unwrap().timestamp, 0.0);
        assert_eq!(session.nearest_frame(-1.0).unwrap().timestamp, 0.0);
        assert_eq!(session.nearest_frame(10.0).unwrap().timestamp, 10.0);
        assert_eq!(session.nearest_frame(11.5).unwrap().timestamp, 10.0);
    }

    #[test]
    fn nearest_frame_tie_break_is_stable() {
        let session = session_with(&[0.0, 5.0, 5.0, 10.0], 10.0);
        let a = session.nearest_frame_index(5.0).unwrap();
        let b = session.nearest_frame_index(5.0).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, 2, "latest of the duplicated timestamps");
    }

    #[test]
    fn seek_notifies_only_on_identity_change() {
        let mut session = session_with(&[0.0, 5.0, 10.0], 10.0);
        assert_eq!(session.seek_to(6.0).unwrap().id, "frame-1");
        // Still inside the same frame's span: no redundant notification.
        assert!(session.seek_to(7.5).is_none());
        assert_eq!(session.seek_to(10.0).unwrap().id, "frame-2");
    }

    #[test]
    fn seek_clamps_to_session_bounds() {
        let mut session = session_with(&[0.0, 5.0, 10.0], 10.0);
        session.seek_to(500.0);
        assert_eq!(session.current_time(), 10.0);
        session.seek_to(-3.0);
        assert_eq!(session.current_time(), 0.0);
    }

    #[test]
    fn skip_moves_one_frame_and_clamps_at_bounds() {
        let mut session = session_with(&[0.0, 5.0, 10.0], 10.0);
        session.seek_to(0.0);

        assert_eq!(session.skip_forward().unwrap().id, "frame-1");
        assert_eq!(session.skip_forward().unwrap().id, "frame-2");
        // Already at the last frame: stays in bounds.
        assert_eq!(session.skip_forward().unwrap().id, "frame-2");
        assert_eq!(session.current_time(), 10.0);

        assert_eq!(session.skip_backward().unwrap().id, "frame-1");
        assert_eq!(session.skip_backward().unwrap().id, "frame-0");
        assert_eq!(session.skip_backward().unwrap().id, "frame-0");
        assert_eq!(session.current_time(), 0.0);
    }

    #[test]
    fn tick_is_noop_while_stopped() {
        let mut session = session_with(&[0.0, 5.0], 10.0);
        assert!(session.tick(Instant::now()).is_none());
        assert_eq!(session.current_time(), 0.0);
    }

    #[test]
    fn playback_advances_and_selects_frames() {
        let mut session = session_with(&[0.0, 5.0], 10.0);
        let t0 = Instant::now();
        session.play(t0);
        assert_eq!(session.play_state(), PlayState::Playing);

        // First tick selects frame-0 (cursor still at 0).
        let first = session.tick(t0).unwrap();
        assert_eq!(first.id, "frame-0");

        // 6 simulated seconds later the cursor crosses into frame-1.
        let selected = session.tick(t0 + Duration::from_secs(6)).unwrap();
        assert_eq!(selected.id, "frame-1");
        assert!((session.current_time() - 6.0).abs() < 1e-9);

        session.pause();
        assert_eq!(session.play_state(), PlayState::Stopped);
    }

    #[test]
    fn playback_wraps_at_duration() {
        let mut session = session_with(&[0.0, 5.0], 10.0);
        let t0 = Instant::now();
        session.play(t0);
        session.tick(t0);
        session.tick(t0 + Duration::from_secs(11));
        assert_eq!(session.current_time(), 0.0);
    }

    #[test]
    fn manual_seek_works_during_playback() {
        let mut session = session_with(&[0.0, 5.0, 10.0], 10.0);
        session.play(Instant::now());
        assert_eq!(session.seek_to(5.5).unwrap().id, "frame-1");
        assert_eq!(session.play_state(), PlayState::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn playback_driver_stops_on_cancellation() {
        let session = Arc::new(Mutex::new(session_with(&[0.0, 5.0], 10.0)));
        session.lock().unwrap().play(Instant::now());

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let selections = Arc::new(Mutex::new(Vec::new()));
        let sink = selections.clone();

        let driver = tokio::spawn(run_playback(session.clone(), cancel_rx, move |frame| {
            sink.lock().unwrap().push(frame.id);
        }));

        tokio::time::advance(Duration::from_millis(100)).await;
        cancel_tx.send(true).unwrap();
        driver.await.unwrap();

        // The first tick selects frame-0 and nothing fires after cancel.
        assert_eq!(selections.lock().unwrap().first().map(String::as_str), Some("frame-0"));
    }
}
