use eframe::egui::Color32;
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

use crate::orientation::Orientation;

/// Gap between a label and the segment edge it is anchored to.
pub const LABEL_PADDING: f64 = 4.0;

/// Linear ramp from 0 at `low` to 1 at `high`, clamped.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ramp {
    pub low: f64,
    pub high: f64,
}

impl Ramp {
    pub fn eval(&self, v: f64) -> f64 {
        if self.high <= self.low {
            return if v >= self.high { 1.0 } else { 0.0 };
        }
        ((v - self.low) / (self.high - self.low)).clamp(0.0, 1.0)
    }
}

/// Label fade thresholds, in screen points.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelRamps {
    /// Rendered width per character; used when depth runs vertically.
    pub width_per_char: Ramp,
    /// Rendered height; used when depth runs horizontally.
    pub height: Ramp,
}

impl Default for LabelRamps {
    fn default() -> Self {
        Self {
            width_per_char: Ramp { low: 4.0, high: 8.0 },
            height: Ramp { low: 15.0, high: 40.0 },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelAlign {
    Start,
    Middle,
    End,
}

/// Opacity for a label on a segment drawn at `rect` (layout space) under zoom `k`.
pub fn opacity(orientation: Orientation, rect: Rect, k: f64, text: &str, ramps: &LabelRamps) -> f64 {
    if orientation.is_horizontal() {
        ramps.height.eval(rect.height() * k)
    } else {
        let chars = text.chars().count();
        if chars == 0 {
            return 0.0;
        }
        ramps.width_per_char.eval(rect.width() * k / chars as f64)
    }
}

/// Where a label sits inside its segment and how it is aligned there.
pub fn anchor(orientation: Orientation, rect: Rect) -> (Point, LabelAlign) {
    let y = rect.y0 + rect.height() / 2.0;
    match orientation {
        Orientation::LeftRight => (Point::new(rect.x0 + LABEL_PADDING, y), LabelAlign::Start),
        Orientation::RightLeft => (Point::new(rect.x1 - LABEL_PADDING, y), LabelAlign::End),
        Orientation::TopDown | Orientation::BottomUp => {
            (Point::new(rect.x0 + rect.width() / 2.0, y), LabelAlign::Middle)
        }
    }
}

/// Scale that cancels zoom `k` on the zoomed axis, keeping text undistorted.
pub fn counter_scale(orientation: Orientation, k: f64) -> Vec2 {
    if orientation.is_horizontal() {
        Vec2::new(1.0, 1.0 / k)
    } else {
        Vec2::new(1.0 / k, 1.0)
    }
}

/// Whether light text reads better than dark text on `fill`.
pub fn prefers_light_text(fill: Color32) -> bool {
    let lum = 0.299 * fill.r() as f64 + 0.587 * fill.g() as f64 + 0.114 * fill.b() as f64;
    lum <= 150.0
}

/// Text colour for a label, from its light/dark flag.
pub fn text_color(light: bool) -> Color32 {
    if light {
        Color32::from_gray(235)
    } else {
        Color32::from_gray(20)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramps_clamp() {
        let r = Ramp { low: 15.0, high: 40.0 };
        assert_eq!(r.eval(0.0), 0.0);
        assert_eq!(r.eval(27.5), 0.5);
        assert_eq!(r.eval(400.0), 1.0);
    }

    #[test]
    fn horizontal_labels_fade_by_height() {
        let ramps = LabelRamps::default();
        let rect = Rect::new(0.0, 0.0, 100.0, 10.0);
        assert_eq!(opacity(Orientation::LeftRight, rect, 1.0, "name", &ramps), 0.0);
        assert_eq!(opacity(Orientation::LeftRight, rect, 4.0, "name", &ramps), 1.0);
    }

    #[test]
    fn vertical_labels_fade_by_width_per_char() {
        let ramps = LabelRamps::default();
        let rect = Rect::new(0.0, 0.0, 24.0, 100.0);
        // 24pt over 4 chars = 6pt/char, halfway up the ramp.
        assert_eq!(opacity(Orientation::TopDown, rect, 1.0, "abcd", &ramps), 0.5);
        assert_eq!(opacity(Orientation::BottomUp, rect, 2.0, "abcd", &ramps), 1.0);
        assert_eq!(opacity(Orientation::TopDown, rect, 1.0, "", &ramps), 0.0);
    }

    #[test]
    fn anchors_follow_orientation() {
        let rect = Rect::new(10.0, 20.0, 110.0, 60.0);
        assert_eq!(anchor(Orientation::LeftRight, rect), (Point::new(14.0, 40.0), LabelAlign::Start));
        assert_eq!(anchor(Orientation::RightLeft, rect), (Point::new(106.0, 40.0), LabelAlign::End));
        assert_eq!(anchor(Orientation::TopDown, rect), (Point::new(60.0, 40.0), LabelAlign::Middle));
    }

    #[test]
    fn counter_scale_cancels_zoom_axis() {
        assert_eq!(counter_scale(Orientation::LeftRight, 4.0), Vec2::new(1.0, 0.25));
        assert_eq!(counter_scale(Orientation::TopDown, 2.0), Vec2::new(0.5, 1.0));
    }

    #[test]
    fn contrast_picks_readable_text() {
        assert!(prefers_light_text(Color32::from_rgb(20, 30, 90)));
        assert!(!prefers_light_text(Color32::from_rgb(211, 211, 211)));
        assert_eq!(text_color(true), Color32::from_gray(235));
        assert_eq!(text_color(false), Color32::from_gray(20));
    }
}
