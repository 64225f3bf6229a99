use crate::types::{Point, Resolution};

/// The canvas's on-screen bounding rectangle, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Converts pointer positions in displayed (CSS) space into the canvas's
/// native pixel space, so freehand points align with the underlying
/// native-resolution frame no matter how the canvas is scaled on screen.
///
/// Scale factors are derived from the stored inputs on every conversion;
/// callers must push new values through `set_display`/`set_native` on
/// load and on every viewport resize. Points are always stored in native
/// space so masks survive display resizes.
#[derive(Debug, Clone, Copy)]
pub struct CanvasMapper {
    native: Resolution,
    display: DisplayRect,
}

impl CanvasMapper {
    pub fn new(native: Resolution, display: DisplayRect) -> Self {
        Self { native, display }
    }

    /// Refresh after a viewport resize.
    pub fn set_display(&mut self, display: DisplayRect) {
        self.display = display;
    }

    /// Refresh after the backing buffer changes (new source loaded).
    pub fn set_native(&mut self, native: Resolution) {
        self.native = native;
    }

    /// Map a pointer event's viewport coordinates to native pixel space.
    /// A degenerate (non-positive) display dimension maps everything onto
    /// the rect origin rather than producing NaN or infinity.
    pub fn to_native(&self, client_x: f64, client_y: f64) -> Point {
        let relative_x = client_x - self.display.left;
        let relative_y = client_y - self.display.top;

        let scale_x = if self.display.width > 0.0 {
            self.native.width as f64 / self.display.width
        } else {
            0.0
        };
        let scale_y = if self.display.height > 0.0 {
            self.native.height as f64 / self.display.height
        } else {
            0.0
        };

        Point {
            x: relative_x * scale_x,
            y: relative_y * scale_y,
        }
    }
}

/// Accumulates one freehand stroke, mapping every pointer position to
/// native space immediately. The finished point sequence is handed to
/// the mask-building collaborator in drawing order.
#[derive(Debug, Default)]
pub struct StrokeBuilder {
    points: Vec<Point>,
    drawing: bool,
}

impl StrokeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, mapper: &CanvasMapper, client_x: f64, client_y: f64) {
        self.drawing = true;
        self.points = vec![mapper.to_native(client_x, client_y)];
    }

    pub fn extend(&mut self, mapper: &CanvasMapper, client_x: f64, client_y: f64) {
        if !self.drawing {
            return;
        }
        self.points.push(mapper.to_native(client_x, client_y));
    }

    /// End the stroke and take its points. Returns `None` when no stroke
    /// was in progress (e.g. a stray pointer-up).
    pub fn finish(&mut self) -> Option<Vec<Point>> {
        if !self.drawing {
            return None;
        }
        self.drawing = false;
        Some(std::mem::take(&mut self.points))
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }
}
