use std::time::Duration;

use eframe::egui::Color32;
use kurbo::{Affine, Point, Rect};

/// Ease-out cubic: fast start, smooth deceleration
pub fn ease_out_cubic(t: f64) -> f64 {
    1.0 - (1.0 - t).powi(3)
}

/// Values a [`Tween`] can interpolate.
pub trait Lerp: Copy {
    fn lerp_to(self, to: Self, t: f64) -> Self;
}

impl Lerp for f64 {
    fn lerp_to(self, to: Self, t: f64) -> Self {
        self + (to - self) * t
    }
}

impl Lerp for Point {
    fn lerp_to(self, to: Self, t: f64) -> Self {
        Point::new(self.x.lerp_to(to.x, t), self.y.lerp_to(to.y, t))
    }
}

impl Lerp for Rect {
    fn lerp_to(self, to: Self, t: f64) -> Self {
        Rect::new(
            self.x0.lerp_to(to.x0, t),
            self.y0.lerp_to(to.y0, t),
            self.x1.lerp_to(to.x1, t),
            self.y1.lerp_to(to.y1, t),
        )
    }
}

impl Lerp for Affine {
    fn lerp_to(self, to: Self, t: f64) -> Self {
        let a = self.as_coeffs();
        let b = to.as_coeffs();
        Affine::new(std::array::from_fn(|i| a[i].lerp_to(b[i], t)))
    }
}

impl Lerp for Color32 {
    fn lerp_to(self, to: Self, t: f64) -> Self {
        let ch = |a: u8, b: u8| (a as f64).lerp_to(b as f64, t).round().clamp(0.0, 255.0) as u8;
        Color32::from_rgba_unmultiplied(
            ch(self.r(), to.r()),
            ch(self.g(), to.g()),
            ch(self.b(), to.b()),
            ch(self.a(), to.a()),
        )
    }
}

/// An interruptible transition of one attribute.
///
/// Retargeting starts from the value interpolated at the moment of the call,
/// so a superseded transition never jumps.
#[derive(Clone, Copy, Debug)]
pub struct Tween<V> {
    from: V,
    to: V,
    /// Seconds, on the caller's frame clock.
    start: f64,
    duration: f64,
}

impl<V: Lerp> Tween<V> {
    pub fn settled(value: V) -> Self {
        Self {
            from: value,
            to: value,
            start: 0.0,
            duration: 0.0,
        }
    }

    /// Start at `from` and head to `to`.
    pub fn between(from: V, to: V, now: f64, duration: Duration) -> Self {
        let mut tween = Self::settled(from);
        tween.retarget(to, now, duration);
        tween
    }

    pub fn progress(&self, now: f64) -> f64 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        ((now - self.start) / self.duration).clamp(0.0, 1.0)
    }

    pub fn value(&self, now: f64) -> V {
        let p = self.progress(now);
        if p >= 1.0 {
            return self.to;
        }
        self.from.lerp_to(self.to, ease_out_cubic(p))
    }

    pub fn is_done(&self, now: f64) -> bool {
        self.progress(now) >= 1.0
    }

    pub fn retarget(&mut self, to: V, now: f64, duration: Duration) {
        if duration.is_zero() {
            *self = Self::settled(to);
            return;
        }
        self.from = self.value(now);
        self.to = to;
        self.start = now;
        self.duration = duration.as_secs_f64();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_duration_snaps() {
        let mut t = Tween::settled(1.0);
        t.retarget(5.0, 10.0, Duration::ZERO);
        assert_eq!(t.value(10.0), 5.0);
        assert!(t.is_done(10.0));
    }

    #[test]
    fn runs_for_its_duration() {
        let t = Tween::between(0.0, 10.0, 1.0, Duration::from_millis(500));
        assert_eq!(t.value(1.0), 0.0);
        let mid = t.value(1.25);
        assert!(mid > 5.0 && mid < 10.0);
        assert_eq!(t.value(1.5), 10.0);
        assert!(!t.is_done(1.4));
        assert!(t.is_done(1.5));
    }

    #[test]
    fn retarget_starts_from_current_value() {
        let mut t = Tween::between(0.0, 100.0, 0.0, Duration::from_secs(1));
        let current = t.value(0.5);
        t.retarget(-50.0, 0.5, Duration::from_secs(1));
        assert_eq!(t.value(0.5), current);
        assert_eq!(t.value(1.5), -50.0);
    }

    #[test]
    fn colors_interpolate_per_channel() {
        let c = Color32::from_rgb(0, 100, 200).lerp_to(Color32::from_rgb(100, 200, 0), 0.5);
        assert_eq!(c, Color32::from_rgb(50, 150, 100));
    }
}
