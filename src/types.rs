use serde::{Deserialize, Serialize};

/// A point in canvas-native pixel space (the decoded frame's own
/// coordinate system, not the scaled on-screen display size).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// A freehand annotation polygon. `points` are in drawing order and may be
/// empty (degenerate stroke). `confidence` is in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mask {
    pub id: String,
    pub points: Vec<Point>,
    pub label: String,
    pub confidence: f64,
}

/// Per-frame segmentation payload. Empty at sampling time; populated later
/// by the external labeling step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Segmentation {
    pub masks: Vec<Mask>,
    pub labels: Vec<String>,
    pub confidence: Vec<f64>,
}

/// One captured video still plus metadata, taken at a fixed timestamp.
/// `thumbnail` is a JPEG data URL and may be empty for a degenerate frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameData {
    pub id: String,
    pub timestamp: f64,
    pub segmentation: Segmentation,
    pub thumbnail: String,
}

impl FrameData {
    pub fn new(index: usize, timestamp: f64, thumbnail: String) -> Self {
        Self {
            id: format!("frame-{index}"),
            timestamp,
            segmentation: Segmentation::default(),
            thumbnail,
        }
    }
}

/// Native pixel dimensions of a video source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// The sampler's output for one video: an ordered, non-empty frame
/// sequence with timestamps in `[0, duration]`, non-decreasing in
/// sampling order and never reordered afterwards. Owned by the caller
/// once returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedVideoData {
    pub frames: Vec<FrameData>,
    pub duration: f64,
    pub resolution: Resolution,
}
