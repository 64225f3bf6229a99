//! Video-to-frame sampling and annotation timeline engine.
//!
//! Turns a video file into an ordered sequence of time-stamped frame
//! records with thumbnails, and keeps a scrubbing/playback timeline, a
//! nearest-frame selector and a freehand-annotation canvas consistent
//! with a single authoritative time cursor. The web layer exposes
//! uploads, sampling runs and the transcription boundary.

pub mod canvas;
pub mod cli;
pub mod media;
pub mod sampler;
pub mod session;
pub mod timeline;
pub mod types;
pub mod web;
