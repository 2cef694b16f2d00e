use std::sync::Arc;
use std::time::{Duration, Instant};

use eframe::egui::Color32;
use kurbo::{Point, Size, Vec2};
use tracing::debug;

use crate::label::{self, prefers_light_text, LabelRamps};
use crate::orientation::Orientation;
use crate::partition::PartitionLayout;
use crate::scene::{LabelTarget, SceneFrame, SceneReconciler, Target};
use crate::tree::{children_fn, ChildrenFn, Hierarchy, LayoutNode, LayoutTree, NodeId, SortFn, WeightFn};
use crate::viewport::{TransformChange, ViewTransform, ViewportController};
use crate::visibility::visible_nodes;

pub const DEFAULT_WIDTH: f64 = 800.0;
pub const DEFAULT_HEIGHT: f64 = 600.0;
pub const DEFAULT_MIN_SEGMENT_SIZE: f64 = 0.8;
pub const DEFAULT_TRANSITION: Duration = Duration::from_millis(800);
pub const DEFAULT_FILL: Color32 = Color32::from_rgb(211, 211, 211);

/// Fill for a node, given the node and its parent.
pub type ColorFn<T> = Box<dyn Fn(&T, Option<&T>) -> Color32>;
pub type TextFn<T> = Box<dyn Fn(&T) -> String>;
pub type PredicateFn<T> = Box<dyn Fn(&T) -> bool>;
/// Click/hover handler; `None` means the background.
pub type NodeHandler<T> = Box<dyn FnMut(Option<&T>)>;
pub type ZoomHandler = Box<dyn FnMut(&TransformChange)>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tooltip {
    pub title: String,
    pub content: String,
}

/// An interactive icicle chart over caller data `T`.
///
/// Setters only record what changed. [`IcicleChart::frame`] does the work, in
/// a fixed order: pending zoom notifications, layout (only when one of its
/// inputs changed), visibility, reconciliation, then sampling.
pub struct IcicleChart<T> {
    // Layout inputs
    canvas: Size,
    orientation: Orientation,
    data: Option<Arc<T>>,
    children: ChildrenFn<T>,
    weight: WeightFn<T>,
    sort: Option<SortFn<T>>,
    exclude_root: bool,

    // Presentation
    color: ColorFn<T>,
    label: TextFn<T>,
    node_class: Option<TextFn<T>>,
    min_segment_size: f64,
    show_labels: bool,
    transition: Duration,
    label_ramps: LabelRamps,

    // Interaction
    on_click: Option<NodeHandler<T>>,
    on_hover: Option<NodeHandler<T>>,
    on_zoom: Option<ZoomHandler>,
    tooltip_enabled: PredicateFn<T>,
    tooltip_title: Option<TextFn<T>>,
    tooltip_content: TextFn<T>,
    hovered: Option<NodeId>,

    // Derived state
    layout: Option<PartitionLayout<T>>,
    viewport: ViewportController,
    scene: SceneReconciler,
    pending: Vec<TransformChange>,
    needs_reparse: bool,
    needs_render: bool,
    skip_transitions_once: bool,
    last_frame: Option<SceneFrame>,
}

impl<T: 'static> IcicleChart<T> {
    pub fn new(children: ChildrenFn<T>, weight: WeightFn<T>) -> Self {
        let canvas = Size::new(DEFAULT_WIDTH, DEFAULT_HEIGHT);
        let orientation = Orientation::default();
        Self {
            canvas,
            orientation,
            data: None,
            children,
            weight,
            sort: None,
            exclude_root: false,
            color: Box::new(|_: &T, _: Option<&T>| DEFAULT_FILL),
            label: Box::new(|_: &T| String::new()),
            node_class: None,
            min_segment_size: DEFAULT_MIN_SEGMENT_SIZE,
            show_labels: true,
            transition: DEFAULT_TRANSITION,
            label_ramps: LabelRamps::default(),
            on_click: None,
            on_hover: None,
            on_zoom: None,
            tooltip_enabled: Box::new(|_: &T| true),
            tooltip_title: None,
            tooltip_content: Box::new(|_: &T| String::new()),
            hovered: None,
            layout: None,
            viewport: ViewportController::new(canvas, orientation.size_axis()),
            scene: SceneReconciler::new(),
            pending: Vec::new(),
            needs_reparse: true,
            needs_render: true,
            skip_transitions_once: false,
            last_frame: None,
        }
    }
}

impl<T: Hierarchy + 'static> IcicleChart<T> {
    /// A chart reading `children`, `value` and `name` straight from the data.
    pub fn for_hierarchy() -> Self {
        let mut chart = Self::new(children_fn(T::children), Box::new(T::value));
        chart.label = Box::new(|d: &T| d.name().to_string());
        chart
    }
}

impl<T> IcicleChart<T> {
    // ---- Layout inputs ----

    pub fn canvas(&self) -> Size {
        self.canvas
    }

    pub fn set_size(&mut self, width: f64, height: f64) {
        let canvas = Size::new(width, height);
        if canvas == self.canvas {
            return;
        }
        self.canvas = canvas;
        self.viewport.set_canvas(canvas);
        self.invalidate_layout();
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Changing orientation resets zoom at once; the zoom axis changes with it.
    pub fn set_orientation(&mut self, orientation: Orientation) {
        if orientation == self.orientation {
            return;
        }
        self.orientation = orientation;
        self.viewport.set_axis(orientation.size_axis());
        let change = self.viewport.zoom_reset(Duration::ZERO);
        self.push_change(change);
        self.invalidate_layout();
    }

    pub fn data(&self) -> Option<&Arc<T>> {
        self.data.as_ref()
    }

    pub fn set_data(&mut self, data: Option<Arc<T>>) {
        self.data = data;
        self.invalidate_layout();
    }

    pub fn set_children(&mut self, children: ChildrenFn<T>) {
        self.children = children;
        self.invalidate_layout();
    }

    /// Changing the weight accessor resets zoom.
    pub fn set_weight(&mut self, weight: WeightFn<T>) {
        self.weight = weight;
        self.zoom_reset();
        self.invalidate_layout();
    }

    pub fn set_sort(&mut self, sort: Option<SortFn<T>>) {
        self.sort = sort;
        self.invalidate_layout();
    }

    pub fn exclude_root(&self) -> bool {
        self.exclude_root
    }

    /// Changing this resets zoom.
    pub fn set_exclude_root(&mut self, exclude_root: bool) {
        if exclude_root == self.exclude_root {
            return;
        }
        self.exclude_root = exclude_root;
        self.zoom_reset();
        self.invalidate_layout();
    }

    fn invalidate_layout(&mut self) {
        self.needs_reparse = true;
        self.needs_render = true;
    }

    // ---- Presentation ----

    pub fn set_color(&mut self, color: ColorFn<T>) {
        self.color = color;
        self.needs_render = true;
    }

    pub fn set_label(&mut self, label: TextFn<T>) {
        self.label = label;
        self.needs_render = true;
    }

    /// Extra whitespace-separated classes for each segment.
    pub fn set_node_class(&mut self, node_class: Option<TextFn<T>>) {
        self.node_class = node_class;
        self.needs_render = true;
    }

    pub fn min_segment_size(&self) -> f64 {
        self.min_segment_size
    }

    pub fn set_min_segment_size(&mut self, min_segment_size: f64) {
        self.min_segment_size = min_segment_size;
        self.needs_render = true;
    }

    pub fn show_labels(&self) -> bool {
        self.show_labels
    }

    pub fn set_show_labels(&mut self, show_labels: bool) {
        self.show_labels = show_labels;
        self.needs_render = true;
    }

    pub fn set_label_ramps(&mut self, ramps: LabelRamps) {
        self.label_ramps = ramps;
        self.needs_render = true;
    }

    pub fn transition_duration(&self) -> Duration {
        self.transition
    }

    /// Takes effect from the next transition.
    pub fn set_transition_duration(&mut self, duration: Duration) {
        self.transition = duration;
    }

    pub fn set_zoom_limits(&mut self, min: f64, max: f64) {
        self.viewport.set_zoom_limits(min, max);
    }

    // ---- Interaction hooks ----

    /// Replaces the default click behaviour (zoom to node / reset on background).
    pub fn set_on_click(&mut self, handler: Option<NodeHandler<T>>) {
        self.on_click = handler;
    }

    pub fn set_on_hover(&mut self, handler: Option<NodeHandler<T>>) {
        self.on_hover = handler;
    }

    /// Observe every transform change.
    pub fn set_on_zoom(&mut self, handler: Option<ZoomHandler>) {
        self.on_zoom = handler;
    }

    pub fn set_tooltip_enabled(&mut self, enabled: PredicateFn<T>) {
        self.tooltip_enabled = enabled;
    }

    /// `None` restores the default title: the ancestry path of labels.
    pub fn set_tooltip_title(&mut self, title: Option<TextFn<T>>) {
        self.tooltip_title = title;
    }

    pub fn set_tooltip_content(&mut self, content: TextFn<T>) {
        self.tooltip_content = content;
    }

    // ---- Zoom ----

    pub fn transform(&self) -> ViewTransform {
        self.viewport.transform()
    }

    pub fn zoom_by(&mut self, factor: f64) {
        let change = self.viewport.zoom_by(factor, self.transition);
        self.push_change(change);
    }

    pub fn zoom_reset(&mut self) {
        if self.viewport.is_animating() || self.viewport.transform() != ViewTransform::IDENTITY {
            debug!("zoom reset");
        }
        let change = self.viewport.zoom_reset(self.transition);
        self.push_change(change);
    }

    /// Zoom so `raw` fills the viewport along the size axis.
    /// Returns `false`, doing nothing, when `raw` is not part of the current layout.
    pub fn zoom_to_node(&mut self, raw: &T) -> bool {
        let span = self.layout.as_ref().and_then(|layout| {
            let id = layout.tree().lookup(raw)?;
            layout.node(id).map(|n| (n.size_start, n.size_end))
        });
        let Some((start, end)) = span else {
            debug!("zoom_to_node: node has no current layout, ignoring");
            return false;
        };
        let change = self.viewport.zoom_to_span(start, end, self.transition);
        self.push_change(change);
        true
    }

    /// Pan with a pointer drag (screen points).
    pub fn drag(&mut self, delta: Vec2) {
        let change = self.viewport.drag(delta);
        self.push_change(change);
    }

    /// Zoom about the pointer with a wheel or pinch delta.
    pub fn wheel(&mut self, pointer: Point, delta: f64) {
        let change = self.viewport.wheel(pointer, delta);
        self.push_change(change);
    }

    /// Pinch zoom about the pointer by a multiplicative factor.
    pub fn pinch(&mut self, pointer: Point, factor: f64) {
        let change = self.viewport.pinch(pointer, factor);
        self.push_change(change);
    }

    fn push_change(&mut self, change: Option<TransformChange>) {
        if let Some(change) = change {
            self.pending.push(change);
        }
    }

    fn apply_change(&mut self, change: TransformChange, now: f64) {
        if self.show_labels && change.duration.is_zero() {
            self.scene.snap_label_zoom(change.transform.k);
        }
        // Continuous gestures must not queue animations behind the pointer.
        self.skip_transitions_once = change.duration.is_zero();
        let axis = self.orientation.size_axis();
        self.scene
            .set_group_transform(change.transform.to_affine(axis), now, change.duration);
        if let Some(handler) = self.on_zoom.as_mut() {
            handler(&change);
        }
        self.needs_render = true;
    }

    // ---- Pointer ----

    fn node_at(&self, pointer: Point) -> Option<NodeId> {
        self.last_frame.as_ref()?.hit(pointer)
    }

    fn raw_of(&self, id: NodeId) -> Option<Arc<T>> {
        self.layout.as_ref()?.node(id).map(|n| Arc::clone(&n.raw))
    }

    /// Dispatch a click at a screen point. Returns the clicked node, if any.
    pub fn click(&mut self, pointer: Point) -> Option<Arc<T>> {
        let raw = self.node_at(pointer).and_then(|id| self.raw_of(id));
        if let Some(handler) = self.on_click.as_mut() {
            handler(raw.as_deref());
        } else if let Some(node) = raw.as_ref() {
            self.zoom_to_node(node);
        } else {
            self.zoom_reset();
        }
        raw
    }

    /// Track the pointer; `None` when it left the canvas.
    pub fn hover(&mut self, pointer: Option<Point>) {
        let hit = pointer.and_then(|p| self.node_at(p));
        if hit == self.hovered {
            return;
        }
        self.hovered = hit;
        let raw = hit.and_then(|id| self.raw_of(id));
        if let Some(handler) = self.on_hover.as_mut() {
            handler(raw.as_deref());
        }
    }

    pub fn hovered(&self) -> Option<NodeId> {
        self.hovered
    }

    pub fn hovered_node(&self) -> Option<&LayoutNode<T>> {
        self.layout.as_ref()?.node(self.hovered?)
    }

    /// Tooltip for the hovered node, unless disabled for it.
    pub fn tooltip(&self) -> Option<Tooltip> {
        let layout = self.layout.as_ref()?;
        let node = layout.node(self.hovered?)?;
        if !(self.tooltip_enabled)(&*node.raw) {
            return None;
        }
        let title = match &self.tooltip_title {
            Some(title) => title(&*node.raw),
            None => {
                let skip = usize::from(self.exclude_root);
                layout
                    .tree()
                    .ancestry(node.id)
                    .iter()
                    .skip(skip)
                    .map(|n| (self.label)(&*n.raw))
                    .collect::<Vec<_>>()
                    .join(" → ")
            }
        };
        Some(Tooltip {
            title,
            content: (self.tooltip_content)(&*node.raw),
        })
    }

    // ---- Rendering ----

    pub fn layout(&self) -> Option<&PartitionLayout<T>> {
        self.layout.as_ref()
    }

    pub fn last_frame(&self) -> Option<&SceneFrame> {
        self.last_frame.as_ref()
    }

    /// Whether another frame would differ from the last one.
    pub fn is_animating(&self, now: f64) -> bool {
        self.needs_render
            || !self.pending.is_empty()
            || self.viewport.is_animating()
            || self.scene.is_animating(now)
    }

    /// Advance to `now` (seconds on the host's clock) and sample the scene.
    /// A zoom in flight moves one step, and culling follows it.
    pub fn frame(&mut self, now: f64) -> &SceneFrame {
        let step = self.viewport.tick(now);
        self.push_change(step);
        for change in std::mem::take(&mut self.pending) {
            self.apply_change(change, now);
        }
        if self.needs_render {
            self.render(now);
        }
        self.scene.prune(now);
        self.last_frame.insert(self.scene.frame(now))
    }

    fn render(&mut self, now: f64) {
        if self.needs_reparse {
            self.parse();
        }
        self.needs_render = false;

        let animate = !self.skip_transitions_once;
        self.skip_transitions_once = false;
        let duration = if animate { self.transition } else { Duration::ZERO };

        let Some(layout) = self.layout.as_ref() else {
            self.scene.clear();
            return;
        };
        let transform = self.viewport.transform();
        let visible = visible_nodes(
            layout,
            transform,
            self.orientation,
            self.canvas,
            self.min_segment_size,
        );
        let targets: Vec<Target> = visible
            .iter()
            .filter_map(|&id| layout.node(id))
            .map(|node| self.target(layout, node, transform.k))
            .collect();

        self.scene
            .reconcile(targets, self.orientation, transform.k, now, duration);
    }

    fn target(&self, layout: &PartitionLayout<T>, node: &LayoutNode<T>, k: f64) -> Target {
        let rect = self.orientation.map(node, self.canvas);
        let parent = node.parent.and_then(|p| layout.node(p)).map(|p| &*p.raw);
        let fill = (self.color)(&*node.raw, parent);

        let mut classes = vec!["node".to_string()];
        if let Some(node_class) = &self.node_class {
            classes.extend(node_class(&*node.raw).split_whitespace().map(str::to_string));
        }

        let label = self.show_labels.then(|| {
            let text = (self.label)(&*node.raw);
            let (anchor, align) = label::anchor(self.orientation, rect);
            LabelTarget {
                opacity: label::opacity(self.orientation, rect, k, &text, &self.label_ramps),
                text,
                anchor,
                align,
                light: prefers_light_text(fill),
            }
        });

        Target {
            id: node.id,
            rect,
            fill,
            classes,
            label,
        }
    }

    fn parse(&mut self) {
        self.needs_reparse = false;
        self.hovered = None;
        let started = Instant::now();
        let extents = self.orientation.layout_extents(self.canvas);
        self.layout = self.data.as_ref().map(|data| {
            let tree = LayoutTree::build(data, &self.children, &self.weight, self.sort.as_ref());
            PartitionLayout::compute(tree, extents, self.exclude_root)
        });
        if let Some(layout) = &self.layout {
            debug!(
                nodes = layout.tree().len(),
                laid_out = layout.laid_out().len(),
                elapsed_us = started.elapsed().as_micros() as u64,
                "layout rebuilt"
            );
        }
    }
}
