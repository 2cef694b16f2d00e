use std::time::Duration;

use kurbo::{Affine, Point, Size, Vec2};
use tracing::trace;

use crate::anim::{ease_out_cubic, Lerp};
use crate::orientation::Axis;

/// Wheel delta (in points) to zoom exponent; one 50pt notch is ~7%.
const WHEEL_SENSITIVITY: f64 = 0.002;
const DEFAULT_MIN_ZOOM: f64 = 1.0;
const DEFAULT_MAX_ZOOM: f64 = f64::INFINITY;

/// Pan/zoom transform: `screen = layout * k + offset` on the zoomable axis.
/// The other axis is always identity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
    pub x: f64,
    pub y: f64,
    pub k: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ViewTransform {
    pub const IDENTITY: ViewTransform = ViewTransform { x: 0.0, y: 0.0, k: 1.0 };

    pub fn offset(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
        }
    }

    fn with_offset(mut self, axis: Axis, offset: f64) -> Self {
        match axis {
            Axis::X => self.x = offset,
            Axis::Y => self.y = offset,
        }
        self
    }

    /// Layout coordinate shown at screen coordinate `screen` on `axis`.
    pub fn invert(&self, screen: f64, axis: Axis) -> f64 {
        (screen - self.offset(axis)) / self.k
    }

    /// The group transform as an affine map, scaling only along `axis`.
    pub fn to_affine(&self, axis: Axis) -> Affine {
        match axis {
            Axis::X => Affine::new([self.k, 0.0, 0.0, 1.0, self.x, 0.0]),
            Axis::Y => Affine::new([1.0, 0.0, 0.0, self.k, 0.0, self.y]),
        }
    }
}

impl Lerp for ViewTransform {
    fn lerp_to(self, to: Self, t: f64) -> Self {
        ViewTransform {
            x: self.x.lerp_to(to.x, t),
            y: self.y.lerp_to(to.y, t),
            k: self.k.lerp_to(to.k, t),
        }
    }
}

/// One transform update. Animated zooms produce one per frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformChange {
    pub transform: ViewTransform,
    pub previous: ViewTransform,
    /// Zero means the dependent re-render should not animate.
    pub duration: Duration,
}

// A programmatic zoom in flight.
#[derive(Clone, Copy, Debug)]
struct ZoomAnim {
    from: ViewTransform,
    to: ViewTransform,
    /// Set on the first tick.
    start: Option<f64>,
    duration: f64,
}

/// Owns the pan/zoom state of the chart.
/// Every mutation goes through [`ViewportController::commit`], which clamps the
/// transform to the canvas and reports the change exactly once. Animated zooms
/// commit an interpolated transform on every [`ViewportController::tick`].
#[derive(Debug)]
pub struct ViewportController {
    transform: ViewTransform,
    canvas: Size,
    axis: Axis,
    min_zoom: f64,
    max_zoom: f64,
    anim: Option<ZoomAnim>,
}

impl ViewportController {
    pub fn new(canvas: Size, axis: Axis) -> Self {
        Self {
            transform: ViewTransform::IDENTITY,
            canvas,
            axis,
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            anim: None,
        }
    }

    pub fn transform(&self) -> ViewTransform {
        self.transform
    }

    /// The zoomable (size) axis.
    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// Translate bounds are `[[0, 0], [width, height]]`.
    pub fn set_canvas(&mut self, canvas: Size) {
        self.canvas = canvas;
    }

    /// Cancels any zoom in flight.
    pub fn set_axis(&mut self, axis: Axis) {
        self.axis = axis;
        self.anim = None;
    }

    pub fn is_animating(&self) -> bool {
        self.anim.is_some()
    }

    /// Scale policy for gesture and `zoom_by` zooming.
    pub fn set_zoom_limits(&mut self, min: f64, max: f64) {
        self.min_zoom = min;
        self.max_zoom = max.max(min);
    }

    fn extent(&self) -> f64 {
        match self.axis {
            Axis::X => self.canvas.width,
            Axis::Y => self.canvas.height,
        }
    }

    /// Multiply the scale by `factor` about the viewport centre.
    pub fn zoom_by(&mut self, factor: f64, duration: Duration) -> Option<TransformChange> {
        let center = self.extent() / 2.0;
        self.zoom_about(center, factor, duration)
    }

    pub fn zoom_reset(&mut self, duration: Duration) -> Option<TransformChange> {
        self.animate_to(ViewTransform::IDENTITY, duration)
    }

    /// Zoom so the size-axis span `[start, end)` fills the viewport.
    pub fn zoom_to_span(&mut self, start: f64, end: f64, duration: Duration) -> Option<TransformChange> {
        let span = end - start;
        if span <= 0.0 {
            return None;
        }
        let k = self.extent() / span;
        let target = ViewTransform::IDENTITY.with_offset(self.axis, -start * k);
        self.animate_to(ViewTransform { k, ..target }, duration)
    }

    /// Pan 1:1 with a pointer drag, in screen points.
    pub fn drag(&mut self, delta: Vec2) -> Option<TransformChange> {
        let d = match self.axis {
            Axis::X => delta.x,
            Axis::Y => delta.y,
        };
        let offset = self.transform.offset(self.axis) + d;
        let next = self.transform.with_offset(self.axis, offset);
        self.anim = None;
        self.commit(next, Duration::ZERO)
    }

    /// Zoom about the pointer. Positive deltas zoom in.
    pub fn wheel(&mut self, pointer: Point, delta: f64) -> Option<TransformChange> {
        let focus = match self.axis {
            Axis::X => pointer.x,
            Axis::Y => pointer.y,
        };
        let factor = (delta * WHEEL_SENSITIVITY).exp2();
        self.zoom_about(focus, factor, Duration::ZERO)
    }

    /// Pinch zoom by a multiplicative `factor`, as a wheel step of equal size.
    pub fn pinch(&mut self, pointer: Point, factor: f64) -> Option<TransformChange> {
        if factor <= 0.0 {
            return None;
        }
        self.wheel(pointer, factor.log2() / WHEEL_SENSITIVITY)
    }

    /// Advance a zoom in flight to `now`, committing the interpolated transform.
    pub fn tick(&mut self, now: f64) -> Option<TransformChange> {
        let anim = self.anim.as_mut()?;
        let start = *anim.start.get_or_insert(now);
        let p = if anim.duration > 0.0 {
            ((now - start) / anim.duration).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let (from, to) = (anim.from, anim.to);
        if p >= 1.0 {
            self.anim = None;
            return self.commit(to, Duration::ZERO);
        }
        self.commit(from.lerp_to(to, ease_out_cubic(p)), Duration::ZERO)
    }

    fn zoom_about(&mut self, focus: f64, factor: f64, duration: Duration) -> Option<TransformChange> {
        let t = self.transform;
        let k = (t.k * factor).clamp(self.min_zoom, self.max_zoom);
        // Keep the layout point under `focus` fixed on screen.
        let under = t.invert(focus, self.axis);
        let next = t.with_offset(self.axis, focus - under * k);
        self.animate_to(ViewTransform { k, ..next }, duration)
    }

    /// Commit at once, or start a zoom that [`ViewportController::tick`] plays out.
    /// A new zoom or gesture interrupts one already in flight.
    fn animate_to(&mut self, target: ViewTransform, duration: Duration) -> Option<TransformChange> {
        self.anim = None;
        if duration.is_zero() {
            return self.commit(target, duration);
        }
        let to = self.constrain(target);
        if to != self.transform {
            trace!(from = ?self.transform, ?to, ?duration, "zoom animation started");
            self.anim = Some(ZoomAnim {
                from: self.transform,
                to,
                start: None,
                duration: duration.as_secs_f64(),
            });
        }
        None
    }

    /// Keep the viewport inside the translate bounds; centre the content when
    /// it is smaller than the viewport.
    fn constrain(&self, t: ViewTransform) -> ViewTransform {
        let extent = self.extent();
        let d0 = t.invert(0.0, self.axis);
        let d1 = t.invert(extent, self.axis) - extent;
        let shift = if d1 > d0 {
            (d0 + d1) / 2.0
        } else if d0 < 0.0 {
            d0
        } else {
            d1.max(0.0)
        };
        t.with_offset(self.axis, t.offset(self.axis) + shift * t.k)
    }

    fn commit(&mut self, next: ViewTransform, duration: Duration) -> Option<TransformChange> {
        let next = self.constrain(next);
        if next == self.transform {
            return None;
        }
        let previous = std::mem::replace(&mut self.transform, next);
        trace!(?previous, transform = ?next, ?duration, "viewport transform changed");
        Some(TransformChange {
            transform: next,
            previous,
            duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLOW: Duration = Duration::from_millis(800);

    fn controller() -> ViewportController {
        ViewportController::new(Size::new(400.0, 200.0), Axis::X)
    }

    #[test]
    fn zoom_by_scales_about_center() {
        let mut vp = controller();
        let change = vp.zoom_by(2.0, Duration::ZERO).unwrap();
        assert_eq!(change.previous, ViewTransform::IDENTITY);
        assert_eq!(change.transform, ViewTransform { x: -200.0, y: 0.0, k: 2.0 });
        assert_eq!(change.duration, Duration::ZERO);
    }

    #[test]
    fn animated_zoom_commits_every_tick() {
        let mut vp = controller();
        assert!(vp.zoom_by(2.0, SLOW).is_none());
        assert!(vp.is_animating());
        assert_eq!(vp.transform(), ViewTransform::IDENTITY);

        // The first tick only pins the start time.
        assert!(vp.tick(0.0).is_none());
        let mid = vp.tick(0.4).unwrap();
        assert_eq!(mid.transform, ViewTransform { x: -175.0, y: 0.0, k: 1.875 });
        assert_eq!(mid.duration, Duration::ZERO);

        let end = vp.tick(0.8).unwrap();
        assert_eq!(end.previous, mid.transform);
        assert_eq!(end.transform, ViewTransform { x: -200.0, y: 0.0, k: 2.0 });
        assert!(!vp.is_animating());
        assert!(vp.tick(1.0).is_none());
    }

    #[test]
    fn gesture_interrupts_animated_zoom() {
        let mut vp = controller();
        vp.zoom_by(2.0, SLOW);
        vp.tick(0.0);
        let mid = vp.tick(0.4).unwrap().transform;
        let change = vp.drag(Vec2::new(10.0, 0.0)).unwrap();
        assert_eq!(change.transform.x, mid.x + 10.0);
        assert!(!vp.is_animating());
        assert!(vp.tick(0.8).is_none());
    }

    #[test]
    fn pinch_zooms_like_an_equal_wheel_step() {
        let mut vp = controller();
        let change = vp.pinch(Point::new(0.0, 50.0), 2.0).unwrap();
        assert!((change.transform.k - 2.0).abs() < 1e-9);
        assert!(change.transform.x.abs() < 1e-9);
        assert!(vp.pinch(Point::new(0.0, 50.0), 1.0).is_none());
    }

    #[test]
    fn zoom_out_is_clamped_to_min_zoom() {
        let mut vp = controller();
        assert!(vp.zoom_by(0.5, SLOW).is_none());
        assert_eq!(vp.transform(), ViewTransform::IDENTITY);
    }

    #[test]
    fn content_smaller_than_viewport_is_centered() {
        let mut vp = controller();
        vp.set_zoom_limits(0.1, 10.0);
        let change = vp.zoom_by(0.5, Duration::ZERO).unwrap();
        assert_eq!(change.transform, ViewTransform { x: 100.0, y: 0.0, k: 0.5 });
    }

    #[test]
    fn drag_is_clamped_to_bounds() {
        let mut vp = controller();
        vp.zoom_by(2.0, Duration::ZERO);
        let change = vp.drag(Vec2::new(500.0, 30.0)).unwrap();
        assert_eq!(change.transform, ViewTransform { x: 0.0, y: 0.0, k: 2.0 });
        assert_eq!(change.duration, Duration::ZERO);

        let change = vp.drag(Vec2::new(-10_000.0, 0.0)).unwrap();
        assert_eq!(change.transform.x, -400.0);
    }

    #[test]
    fn drag_on_pinned_axis_does_nothing() {
        let mut vp = controller();
        vp.zoom_by(2.0, Duration::ZERO);
        assert!(vp.drag(Vec2::new(0.0, 50.0)).is_none());
    }

    #[test]
    fn wheel_keeps_pointer_fixed() {
        let mut vp = ViewportController::new(Size::new(300.0, 600.0), Axis::Y);
        let pointer = Point::new(10.0, 150.0);
        let before = vp.transform().invert(pointer.y, Axis::Y);
        let change = vp.wheel(pointer, 500.0).unwrap();
        let after = change.transform.invert(pointer.y, Axis::Y);
        assert!((before - after).abs() < 1e-9);
        assert!(change.transform.k > 1.0);
        assert_eq!(change.transform.x, 0.0);
    }

    #[test]
    fn zoom_to_span_then_reset_round_trips() {
        let mut vp = controller();
        let change = vp.zoom_to_span(100.0, 200.0, Duration::ZERO).unwrap();
        assert_eq!(change.transform, ViewTransform { x: -400.0, y: 0.0, k: 4.0 });
        let change = vp.zoom_reset(Duration::ZERO).unwrap();
        assert_eq!(change.transform, ViewTransform::IDENTITY);
        assert!(vp.zoom_reset(SLOW).is_none());
        assert!(!vp.is_animating());
    }

    #[test]
    fn zero_span_is_ignored() {
        let mut vp = controller();
        assert!(vp.zoom_to_span(50.0, 50.0, SLOW).is_none());
    }

    #[test]
    fn affine_scales_only_the_zoom_axis() {
        let t = ViewTransform { x: 0.0, y: -30.0, k: 3.0 };
        let p = t.to_affine(Axis::Y) * Point::new(10.0, 20.0);
        assert_eq!(p, Point::new(10.0, 30.0));
    }
}
