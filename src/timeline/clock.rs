use std::time::Instant;

/// Position feed from a live media element (decoder-driven playback).
/// When present and not paused, its position is ground truth for the
/// timeline cursor.
pub trait MediaClock: Send {
    fn position(&self) -> f64;
    fn is_paused(&self) -> bool;
    fn play(&mut self);
    fn pause(&mut self);
}

/// Wall-clock simulation state: advances the cursor by the measured
/// delta between ticks, clamped to `[0, duration]`, wrapping to 0 at the
/// end (loop playback).
#[derive(Debug, Default)]
pub struct WallState {
    last_tick: Option<Instant>,
}

impl WallState {
    fn advance(&mut self, current: f64, now: Instant, duration: f64) -> f64 {
        let delta = match self.last_tick {
            Some(last) => now.saturating_duration_since(last).as_secs_f64(),
            None => 0.0,
        };
        self.last_tick = Some(now);

        let next = (current + delta).clamp(0.0, duration);
        if next >= duration && duration > 0.0 {
            0.0
        } else {
            next
        }
    }

    fn reset(&mut self) {
        self.last_tick = None;
    }
}

/// The clock source driving playback, chosen once per session rather
/// than re-branched on every tick. A device clock is adopted verbatim
/// while it is running; a paused device falls back to the wall-clock
/// simulation, as does a session with no media element at all.
pub enum PlaybackClock {
    Device {
        media: Box<dyn MediaClock>,
        fallback: WallState,
    },
    Wall(WallState),
}

impl PlaybackClock {
    pub fn wall() -> Self {
        PlaybackClock::Wall(WallState::default())
    }

    pub fn device(media: Box<dyn MediaClock>) -> Self {
        PlaybackClock::Device {
            media,
            fallback: WallState::default(),
        }
    }

    /// One playback step: the next authoritative cursor position.
    pub fn tick(&mut self, current: f64, now: Instant, duration: f64) -> f64 {
        match self {
            PlaybackClock::Device { media, fallback } => {
                if media.is_paused() {
                    fallback.advance(current, now, duration)
                } else {
                    // Keep the fallback's reference point fresh so a later
                    // pause does not replay the whole device-driven span.
                    fallback.last_tick = Some(now);
                    media.position().clamp(0.0, duration)
                }
            }
            PlaybackClock::Wall(state) => state.advance(current, now, duration),
        }
    }

    pub fn start(&mut self, now: Instant) {
        match self {
            PlaybackClock::Device { media, fallback } => {
                media.play();
                fallback.last_tick = Some(now);
            }
            PlaybackClock::Wall(state) => state.last_tick = Some(now),
        }
    }

    pub fn stop(&mut self) {
        match self {
            PlaybackClock::Device { media, fallback } => {
                media.pause();
                fallback.reset();
            }
            PlaybackClock::Wall(state) => state.reset(),
        }
    }
}
