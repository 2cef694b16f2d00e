use std::collections::BTreeMap;
use std::time::Duration;

use eframe::egui::Color32;
use kurbo::{Affine, Point, Rect, Vec2};
use tracing::trace;

use crate::anim::Tween;
use crate::label::{counter_scale, LabelAlign};
use crate::orientation::Orientation;
use crate::tree::NodeId;

/// Gap left between depth levels, on the depth axis.
const DEPTH_INSET: f64 = 1.0;

/// Where a visible node should end up after this render.
#[derive(Clone, Debug)]
pub struct Target {
    pub id: NodeId,
    /// Orientation-mapped rect, before pan/zoom.
    pub rect: Rect,
    pub fill: Color32,
    pub classes: Vec<String>,
    pub label: Option<LabelTarget>,
}

#[derive(Clone, Debug)]
pub struct LabelTarget {
    pub text: String,
    pub anchor: Point,
    pub align: LabelAlign,
    pub opacity: f64,
    pub light: bool,
}

/// A sampled label, ready to draw.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneLabel {
    pub text: String,
    pub anchor: Point,
    pub align: LabelAlign,
    pub opacity: f64,
    /// Multiplies the group transform to keep text at its nominal size.
    pub counter_scale: Vec2,
    pub light: bool,
}

/// A sampled segment, ready to draw.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneItem {
    pub id: NodeId,
    pub rect: Rect,
    pub fill: Color32,
    /// Fades to 0 while exiting.
    pub opacity: f64,
    pub exiting: bool,
    pub classes: Vec<String>,
    pub label: Option<SceneLabel>,
}

/// The whole scene at one instant: segments in layout space plus the group
/// transform that maps them to the screen.
#[derive(Clone, Debug)]
pub struct SceneFrame {
    pub transform: Affine,
    pub items: Vec<SceneItem>,
}

impl SceneFrame {
    /// Topmost live segment under a screen point.
    pub fn hit(&self, screen: Point) -> Option<NodeId> {
        let local = self.transform.inverse() * screen;
        self.items
            .iter()
            .rev()
            .find(|item| !item.exiting && item.rect.contains(local))
            .map(|item| item.id)
    }
}

/// Counts from one reconciliation pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub entered: usize,
    pub updated: usize,
    pub exited: usize,
}

struct SceneNode {
    rect: Tween<Rect>,
    fill: Tween<Color32>,
    presence: Tween<f64>,
    exiting: bool,
    classes: Vec<String>,
    label: Option<LabelState>,
}

struct LabelState {
    text: String,
    align: LabelAlign,
    light: bool,
    anchor: Tween<Point>,
    opacity: Tween<f64>,
    /// Zoom factor the label is counter-scaled against.
    zoom: Tween<f64>,
}

fn final_pose(orientation: Orientation, rect: Rect) -> Rect {
    if orientation.is_horizontal() {
        Rect::new(rect.x0, rect.y0, (rect.x1 - DEPTH_INSET).max(rect.x0), rect.y1)
    } else {
        Rect::new(rect.x0, rect.y0, rect.x1, (rect.y1 - DEPTH_INSET).max(rect.y0))
    }
}

/// Zero extent on the size axis, centred on the final rect.
fn entry_pose(orientation: Orientation, rect: Rect) -> Rect {
    let full = final_pose(orientation, rect);
    if orientation.is_horizontal() {
        let mid = full.y0 + full.height() / 2.0;
        Rect::new(full.x0, mid, full.x1, mid)
    } else {
        let mid = full.x0 + full.width() / 2.0;
        Rect::new(mid, full.y0, mid, full.y1)
    }
}

/// Keyed enter/update/exit diff of the visible set, with every attribute
/// animated through its own interruptible tween.
pub struct SceneReconciler {
    nodes: BTreeMap<NodeId, SceneNode>,
    group: Tween<Affine>,
    orientation: Orientation,
    /// Zoom at the previous reconciliation; new labels scale from here.
    prev_k: f64,
}

impl Default for SceneReconciler {
    fn default() -> Self {
        Self {
            nodes: BTreeMap::new(),
            group: Tween::settled(Affine::IDENTITY),
            orientation: Orientation::default(),
            prev_k: 1.0,
        }
    }
}

impl SceneReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.get(&id).is_some_and(|n| !n.exiting)
    }

    /// Drop everything immediately (no data).
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Move the pan/zoom group transform, animated over `duration`.
    pub fn set_group_transform(&mut self, transform: Affine, now: f64, duration: Duration) {
        self.group.retarget(transform, now, duration);
    }

    /// Rescale every label to zoom `k` at once, for un-animated zoom steps.
    pub fn snap_label_zoom(&mut self, k: f64) {
        for label in self.nodes.values_mut().filter_map(|n| n.label.as_mut()) {
            label.zoom = Tween::settled(k);
        }
        self.prev_k = k;
    }

    /// Diff `targets` against the current scene. `duration` of zero applies
    /// the new state immediately.
    pub fn reconcile(
        &mut self,
        targets: Vec<Target>,
        orientation: Orientation,
        k: f64,
        now: f64,
        duration: Duration,
    ) -> ReconcileStats {
        self.orientation = orientation;
        let mut stats = ReconcileStats::default();
        let live: std::collections::HashSet<NodeId> = targets.iter().map(|t| t.id).collect();

        // Exiting
        let animate = !duration.is_zero();
        self.nodes.retain(|id, node| {
            if live.contains(id) {
                return true;
            }
            if !node.exiting {
                stats.exited += 1;
                node.exiting = true;
                node.presence.retarget(0.0, now, duration);
            }
            animate
        });

        let prev_k = self.prev_k;
        for target in targets {
            let pose = final_pose(orientation, target.rect);
            match self.nodes.get_mut(&target.id) {
                Some(node) => {
                    stats.updated += 1;
                    node.exiting = false;
                    node.presence.retarget(1.0, now, duration);
                    node.rect.retarget(pose, now, duration);
                    node.fill.retarget(target.fill, now, duration);
                    node.classes = target.classes;
                    node.label = match (node.label.take(), target.label) {
                        (Some(mut state), Some(label)) => {
                            state.anchor.retarget(label.anchor, now, duration);
                            state.opacity.retarget(label.opacity, now, duration);
                            state.zoom.retarget(k, now, duration);
                            state.text = label.text;
                            state.align = label.align;
                            state.light = label.light;
                            Some(state)
                        }
                        (None, Some(label)) => Some(entering_label(label, prev_k, k, now, duration)),
                        (_, None) => None,
                    };
                }
                None => {
                    stats.entered += 1;
                    let node = SceneNode {
                        rect: Tween::between(entry_pose(orientation, target.rect), pose, now, duration),
                        fill: Tween::settled(target.fill),
                        presence: Tween::settled(1.0),
                        exiting: false,
                        classes: target.classes,
                        label: target
                            .label
                            .map(|label| entering_label(label, prev_k, k, now, duration)),
                    };
                    self.nodes.insert(target.id, node);
                }
            }
        }
        self.prev_k = k;

        trace!(
            entered = stats.entered,
            updated = stats.updated,
            exited = stats.exited,
            "scene reconciled"
        );
        stats
    }

    /// Forget exited nodes whose fade has finished.
    pub fn prune(&mut self, now: f64) {
        self.nodes
            .retain(|_, node| !(node.exiting && node.presence.is_done(now)));
    }

    pub fn is_animating(&self, now: f64) -> bool {
        !self.group.is_done(now)
            || self.nodes.values().any(|n| {
                !n.rect.is_done(now)
                    || !n.fill.is_done(now)
                    || !n.presence.is_done(now)
                    || n.label.as_ref().is_some_and(|l| {
                        !l.anchor.is_done(now) || !l.opacity.is_done(now) || !l.zoom.is_done(now)
                    })
            })
    }

    /// Sample every tween at `now`.
    pub fn frame(&self, now: f64) -> SceneFrame {
        let items = self
            .nodes
            .iter()
            .map(|(&id, node)| SceneItem {
                id,
                rect: node.rect.value(now),
                fill: node.fill.value(now),
                opacity: node.presence.value(now),
                exiting: node.exiting,
                classes: node.classes.clone(),
                label: node.label.as_ref().map(|l| SceneLabel {
                    text: l.text.clone(),
                    anchor: l.anchor.value(now),
                    align: l.align,
                    opacity: l.opacity.value(now),
                    counter_scale: counter_scale(self.orientation, l.zoom.value(now)),
                    light: l.light,
                }),
            })
            .collect();
        SceneFrame {
            transform: self.group.value(now),
            items,
        }
    }
}

fn entering_label(label: LabelTarget, prev_k: f64, k: f64, now: f64, duration: Duration) -> LabelState {
    LabelState {
        text: label.text,
        align: label.align,
        light: label.light,
        anchor: Tween::settled(label.anchor),
        opacity: Tween::between(0.0, label.opacity, now, duration),
        zoom: Tween::between(prev_k, k, now, duration),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::tests::{item_children, sample, weight_fn};
    use crate::tree::LayoutTree;

    const SLOW: Duration = Duration::from_millis(800);

    fn ids(n: usize) -> Vec<NodeId> {
        let tree = LayoutTree::build(&sample(), &item_children(), &weight_fn(), None);
        tree.nodes().iter().take(n).map(|node| node.id).collect()
    }

    fn target(id: NodeId, rect: Rect) -> Target {
        Target {
            id,
            rect,
            fill: Color32::LIGHT_GRAY,
            classes: vec!["node".into()],
            label: Some(LabelTarget {
                text: "x".into(),
                anchor: rect.center(),
                align: LabelAlign::Middle,
                opacity: 1.0,
                light: false,
            }),
        }
    }

    #[test]
    fn enter_grows_from_entry_pose() {
        let id = ids(1)[0];
        let mut scene = SceneReconciler::new();
        let rect = Rect::new(0.0, 0.0, 100.0, 50.0);
        let stats = scene.reconcile(vec![target(id, rect)], Orientation::TopDown, 1.0, 0.0, SLOW);
        assert_eq!(stats, ReconcileStats { entered: 1, updated: 0, exited: 0 });

        let start = scene.frame(0.0).items[0].rect;
        assert_eq!(start, Rect::new(50.0, 0.0, 50.0, 49.0));
        let end = scene.frame(1.0).items[0].rect;
        assert_eq!(end, Rect::new(0.0, 0.0, 100.0, 49.0));
        assert!(!scene.is_animating(1.0));
    }

    #[test]
    fn horizontal_inset_is_on_width() {
        let id = ids(1)[0];
        let mut scene = SceneReconciler::new();
        let rect = Rect::new(0.0, 0.0, 100.0, 50.0);
        scene.reconcile(vec![target(id, rect)], Orientation::LeftRight, 1.0, 0.0, Duration::ZERO);
        assert_eq!(scene.frame(0.0).items[0].rect, Rect::new(0.0, 0.0, 99.0, 50.0));
    }

    #[test]
    fn update_interrupts_from_current_geometry() {
        let id = ids(1)[0];
        let mut scene = SceneReconciler::new();
        let a = Rect::new(0.0, 0.0, 100.0, 51.0);
        let b = Rect::new(200.0, 0.0, 300.0, 51.0);
        scene.reconcile(vec![target(id, a)], Orientation::TopDown, 1.0, 0.0, Duration::ZERO);
        scene.reconcile(vec![target(id, b)], Orientation::TopDown, 1.0, 1.0, SLOW);
        let mid = scene.frame(1.2).items[0].rect;

        let stats = scene.reconcile(vec![target(id, a)], Orientation::TopDown, 1.0, 1.2, SLOW);
        assert_eq!(stats.updated, 1);
        assert_eq!(scene.frame(1.2).items[0].rect, mid);
        assert_eq!(scene.frame(5.0).items[0].rect, Rect::new(0.0, 0.0, 100.0, 50.0));
    }

    #[test]
    fn exit_fades_then_prunes() {
        let both = ids(2);
        let mut scene = SceneReconciler::new();
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        scene.reconcile(both.iter().map(|&id| target(id, rect)).collect(), Orientation::TopDown, 1.0, 0.0, Duration::ZERO);

        let stats = scene.reconcile(vec![target(both[0], rect)], Orientation::TopDown, 1.0, 1.0, SLOW);
        assert_eq!(stats.exited, 1);
        assert_eq!(scene.len(), 2);
        assert!(!scene.contains(both[1]));
        let fading = scene.frame(1.4).items[1].opacity;
        assert!(fading > 0.0 && fading < 1.0);

        scene.prune(2.0);
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn exit_without_animation_is_immediate() {
        let both = ids(2);
        let mut scene = SceneReconciler::new();
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        scene.reconcile(both.iter().map(|&id| target(id, rect)).collect(), Orientation::TopDown, 1.0, 0.0, Duration::ZERO);
        let stats = scene.reconcile(vec![target(both[0], rect)], Orientation::TopDown, 1.0, 1.0, Duration::ZERO);
        assert_eq!(stats.exited, 1);
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn label_counter_scale_tweens_between_zooms() {
        let id = ids(1)[0];
        let mut scene = SceneReconciler::new();
        let rect = Rect::new(0.0, 0.0, 100.0, 50.0);
        scene.reconcile(vec![target(id, rect)], Orientation::LeftRight, 1.0, 0.0, Duration::ZERO);
        scene.reconcile(vec![target(id, rect)], Orientation::LeftRight, 4.0, 1.0, SLOW);

        let start = scene.frame(1.0).items[0].label.clone().unwrap();
        assert_eq!(start.counter_scale, Vec2::new(1.0, 1.0));
        let mid = scene.frame(1.3).items[0].label.clone().unwrap();
        assert!(mid.counter_scale.y < 1.0 && mid.counter_scale.y > 0.25);
        let end = scene.frame(2.0).items[0].label.clone().unwrap();
        assert_eq!(end.counter_scale, Vec2::new(1.0, 0.25));

        scene.snap_label_zoom(2.0);
        let snapped = scene.frame(1.0).items[0].label.clone().unwrap();
        assert_eq!(snapped.counter_scale, Vec2::new(1.0, 0.5));
    }

    #[test]
    fn hit_test_uses_group_transform() {
        let both = ids(2);
        let mut scene = SceneReconciler::new();
        let targets = vec![
            target(both[0], Rect::new(0.0, 0.0, 50.0, 21.0)),
            target(both[1], Rect::new(50.0, 0.0, 100.0, 21.0)),
        ];
        scene.reconcile(targets, Orientation::TopDown, 2.0, 0.0, Duration::ZERO);
        scene.set_group_transform(Affine::new([2.0, 0.0, 0.0, 1.0, -100.0, 0.0]), 0.0, Duration::ZERO);
        let frame = scene.frame(0.0);
        assert_eq!(frame.hit(Point::new(10.0, 5.0)), Some(both[1]));
        assert_eq!(frame.hit(Point::new(10.0, 40.0)), None);
    }
}
