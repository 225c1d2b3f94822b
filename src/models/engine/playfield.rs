//! Playfield layout and the per-frame scroll viewport.

use serde::{Deserialize, Serialize};

/// Distance in pixels between the hit position and the admission horizon.
pub const VISUAL_HORIZON_PX: f64 = 1000.0;

/// Scroll-space distance admitted ahead of the current position at
/// `scroll_speed == 1` and `rate == 1`.
pub const LOOKAHEAD_BASE: f64 = 2000.0;

/// A point in screen space (pixels, y grows downwards).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Geometry of the playfield on screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayfieldLayout {
    /// Height of the visible area in pixels.
    pub viewport_height: f64,
    /// Y of the receptors, where objects are hit.
    pub hit_position: f64,
    /// Horizontal center of the stage.
    pub center_x: f64,
    pub column_width: f64,
}

impl Default for PlayfieldLayout {
    fn default() -> Self {
        Self {
            viewport_height: 1080.0,
            hit_position: 930.0,
            center_x: 960.0,
            column_width: 100.0,
        }
    }
}

impl PlayfieldLayout {
    pub fn stage_width(&self, lane_count: usize) -> f64 {
        lane_count as f64 * self.column_width
    }

    /// Left edge of the stage for the given lane count.
    pub fn stage_left(&self, lane_count: usize) -> f64 {
        self.center_x - self.stage_width(lane_count) / 2.0
    }

    /// Lane under `x`, clamped to `[0, lane_count)`.
    pub fn lane_at_x(&self, x: f64, lane_count: usize) -> usize {
        if lane_count == 0 || self.column_width <= 0.0 {
            return 0;
        }

        let raw = ((x - self.stage_left(lane_count)) / self.column_width).floor();
        raw.clamp(0.0, (lane_count - 1) as f64) as usize
    }

    /// Horizontal center of `lane`.
    pub fn lane_center_x(&self, lane: usize, lane_count: usize) -> f64 {
        self.stage_left(lane_count) + (lane as f64 + 0.5) * self.column_width
    }
}

/// Scroll state of one frame: where the clock is in scroll space and how
/// scroll-space distances map to pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub layout: PlayfieldLayout,
    /// Clock time in milliseconds.
    pub current_time: f64,
    /// Clock time resolved to scroll space.
    pub current_position: f64,
    /// Playback rate of the screen.
    pub rate: f64,
    /// Configured scroll speed.
    pub scroll_speed: f64,
}

impl Viewport {
    /// Pixels per scroll-space millisecond.
    pub fn pixels_per_ms(&self) -> f64 {
        VISUAL_HORIZON_PX / LOOKAHEAD_BASE * self.scroll_speed / self.rate
    }

    /// Scroll-space distance ahead of the current position that is admitted.
    pub fn lookahead(&self) -> f64 {
        LOOKAHEAD_BASE * self.rate / self.scroll_speed
    }

    /// Furthest scroll position admitted this frame.
    pub fn horizon(&self) -> f64 {
        self.current_position + self.lookahead()
    }

    /// Screen y of something at scroll position `position`.
    pub fn y_for_position(&self, position: f64) -> f64 {
        self.layout.hit_position - (position - self.current_position) * self.pixels_per_ms()
    }

    /// Scroll position drawn at screen y.
    pub fn position_at_y(&self, y: f64) -> f64 {
        self.current_position + (self.layout.hit_position - y) / self.pixels_per_ms()
    }

    /// Positions strictly below this are drawn past the bottom of the viewport.
    pub fn expiry_position(&self) -> f64 {
        self.position_at_y(self.layout.viewport_height)
    }

    pub fn is_below_viewport(&self, position: f64) -> bool {
        self.y_for_position(position) > self.layout.viewport_height
    }
}
