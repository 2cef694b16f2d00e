use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use eframe::egui;
use icicle::label::{text_color, LabelAlign};
use icicle::scanner::{scan_directory, FileNode, ScanProgress};
use icicle::{by_weight_descending, ChartSettings, IcicleChart, Orientation, SceneFrame};
use kurbo::{Point, Vec2};
use tracing::{info, warn};

const ZOOM_STEP: f64 = 1.5;
const LABEL_FONT_SIZE: f32 = 12.0;
/// Labels fainter than this are not drawn.
const MIN_LABEL_ALPHA: f64 = 0.02;
const MIN_FONT_SIZE: f32 = 6.0;
const MAX_FONT_SIZE: f32 = 24.0;

pub struct IcicleApp {
    chart: IcicleChart<FileNode>,

    // Scan state
    scan_root: Option<Arc<FileNode>>,
    scanning: bool,
    scan_progress: Option<Arc<ScanProgress>>,
    scan_receiver: Option<Receiver<icicle::Result<Arc<FileNode>>>>,
    scan_error: Option<String>,

    disks: Vec<(String, PathBuf)>,
}

impl IcicleApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, settings: &ChartSettings, start: Option<PathBuf>) -> Self {
        let mut chart = IcicleChart::<FileNode>::for_hierarchy();
        settings.apply(&mut chart);
        chart.set_sort(Some(by_weight_descending()));

        let mut app = Self {
            chart,
            scan_root: None,
            scanning: false,
            scan_progress: None,
            scan_receiver: None,
            scan_error: None,
            disks: list_disks(),
        };
        if let Some(path) = start {
            app.start_scan(path);
        }
        app
    }

    fn start_scan(&mut self, path: PathBuf) {
        if let Some(ref prog) = self.scan_progress {
            prog.cancel.store(true, Ordering::Relaxed);
        }
        info!(path = %path.display(), "starting scan");
        self.scan_root = None;
        self.scan_error = None;
        self.chart.set_data(None);
        self.scanning = true;

        let progress = Arc::new(ScanProgress::new());
        self.scan_progress = Some(progress.clone());

        let (tx, rx) = std::sync::mpsc::channel();
        self.scan_receiver = Some(rx);

        std::thread::spawn(move || {
            let result = scan_directory(&path, progress);
            let _ = tx.send(result);
        });
    }

    fn finish_scan(&mut self, result: icicle::Result<Arc<FileNode>>) {
        self.scanning = false;
        self.scan_receiver = None;
        match result {
            Ok(root) => {
                self.show_tree(Arc::clone(&root));
                self.scan_root = Some(root);
            }
            Err(icicle::Error::Cancelled) => {}
            Err(err) => {
                warn!(%err, "scan failed");
                self.scan_error = Some(err.to_string());
            }
        }
    }

    fn show_tree(&mut self, root: Arc<FileNode>) {
        let base = root.path.clone();
        let total = root.size;
        self.chart.set_color(Box::new(move |node: &FileNode, _: Option<&FileNode>| node_color(&base, node)));
        self.chart.set_tooltip_content(Box::new(move |node: &FileNode| {
            let pct = if total > 0 {
                node.size as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            let kind = if node.is_dir { "D" } else { "F" };
            format!("[{}] {} ({:.1}%)", kind, format_size(node.size), pct)
        }));
        self.chart.zoom_reset();
        self.chart.set_data(Some(root));
    }

    fn top_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("Icicle");
            ui.separator();

            if ui.button("Open Folder...").clicked() {
                if let Some(path) = rfd::FileDialog::new().pick_folder() {
                    self.start_scan(path);
                }
            }

            ui.separator();
            let mut picked = None;
            for (name, mount) in &self.disks {
                if ui.button(name).on_hover_text(mount.display().to_string()).clicked() {
                    picked = Some(mount.clone());
                }
            }
            if let Some(path) = picked {
                self.start_scan(path);
            }

            if self.scanning {
                ui.separator();
                ui.spinner();
                if let Some(ref prog) = self.scan_progress {
                    let files = prog.files_scanned.load(Ordering::Relaxed);
                    let bytes = prog.bytes_scanned.load(Ordering::Relaxed);
                    ui.label(format!(
                        "Scanning... {} files, {}",
                        format_count(files),
                        format_size(bytes)
                    ));
                }
                if ui.button("Cancel").clicked() {
                    if let Some(ref prog) = self.scan_progress {
                        prog.cancel.store(true, Ordering::Relaxed);
                    }
                }
            }
        });

        ui.horizontal(|ui| {
            let mut orientation = self.chart.orientation();
            egui::ComboBox::from_label("Orientation")
                .selected_text(orientation.label())
                .show_ui(ui, |ui| {
                    for o in Orientation::ALL {
                        ui.selectable_value(&mut orientation, o, o.label());
                    }
                });
            self.chart.set_orientation(orientation);

            let mut exclude_root = self.chart.exclude_root();
            if ui.checkbox(&mut exclude_root, "Hide root").changed() {
                self.chart.set_exclude_root(exclude_root);
            }
            let mut show_labels = self.chart.show_labels();
            if ui.checkbox(&mut show_labels, "Labels").changed() {
                self.chart.set_show_labels(show_labels);
            }

            ui.separator();
            if ui.button("+").on_hover_text("Zoom in").clicked() {
                self.chart.zoom_by(ZOOM_STEP);
            }
            if ui.button("-").on_hover_text("Zoom out").clicked() {
                self.chart.zoom_by(1.0 / ZOOM_STEP);
            }
            if ui.button("Reset").clicked() {
                self.chart.zoom_reset();
            }
        });
    }

    fn status_bar(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if let Some(root) = &self.scan_root {
                ui.label(format!(
                    "Total: {} | {} items",
                    format_size(root.size),
                    root.children.len()
                ));
            }
            if let Some(tip) = self.chart.tooltip() {
                ui.separator();
                ui.strong(tip.title);
                ui.label(tip.content);
            }
        });
    }

    fn chart_panel(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let rect = ui.available_rect_before_wrap();
        self.chart.set_size(rect.width() as f64, rect.height() as f64);
        let response = ui.allocate_rect(rect, egui::Sense::click_and_drag());
        let local = |p: egui::Pos2| Point::new((p.x - rect.min.x) as f64, (p.y - rect.min.y) as f64);

        // Input runs against the frame the user is looking at.
        let pointer = response.hover_pos().map(local);
        self.chart.hover(pointer);
        if response.dragged() {
            let d = response.drag_delta();
            self.chart.drag(Vec2::new(d.x as f64, d.y as f64));
        }
        if let Some(p) = pointer {
            let (scroll, pinch) = ctx.input(|i| (i.smooth_scroll_delta.y, i.zoom_delta()));
            if scroll != 0.0 {
                self.chart.wheel(p, scroll as f64);
            }
            if pinch != 1.0 {
                self.chart.pinch(p, pinch as f64);
            }
        }
        if response.clicked() {
            if let Some(p) = response.interact_pointer_pos() {
                self.chart.click(local(p));
            }
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.chart.zoom_reset();
        }

        let now = ctx.input(|i| i.time);
        let hovered = self.chart.hovered();
        let frame = self.chart.frame(now);
        paint(&ui.painter_at(rect), rect, frame, hovered);

        if self.chart.is_animating(now) {
            ctx.request_repaint();
        }
    }
}

impl eframe::App for IcicleApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.scanning {
            let result = self.scan_receiver.as_ref().and_then(|rx| rx.try_recv().ok());
            if let Some(result) = result {
                self.finish_scan(result);
            }
            ctx.request_repaint();
        }

        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| self.top_bar(ui));

        if self.scan_root.is_some() && !self.scanning {
            egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| self.status_bar(ui));
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.scanning {
                ui.vertical_centered(|ui| {
                    ui.add_space(ui.available_height() / 3.0);
                    ui.heading("Scanning...");
                    if let Some(ref prog) = self.scan_progress {
                        let files = prog.files_scanned.load(Ordering::Relaxed);
                        let bytes = prog.bytes_scanned.load(Ordering::Relaxed);
                        ui.label(format!("{} files found", format_count(files)));
                        ui.label(format!("{} total", format_size(bytes)));
                    }
                    ui.spinner();
                });
                return;
            }

            if self.scan_root.is_none() {
                ui.vertical_centered(|ui| {
                    ui.add_space(ui.available_height() / 3.0);
                    ui.heading("Welcome to Icicle");
                    ui.add_space(10.0);
                    if let Some(err) = &self.scan_error {
                        ui.colored_label(egui::Color32::LIGHT_RED, err);
                    } else {
                        ui.label("Pick a disk or folder above to see it as an icicle chart.");
                    }
                    ui.add_space(20.0);
                    if ui.button("Open Folder...").clicked() {
                        if let Some(path) = rfd::FileDialog::new().pick_folder() {
                            self.start_scan(path);
                        }
                    }
                });
                return;
            }

            self.chart_panel(ui, ctx);
        });
    }
}

// ===================== Painting =====================

fn to_screen(canvas: egui::Rect, r: kurbo::Rect) -> egui::Rect {
    egui::Rect::from_min_max(
        egui::pos2(canvas.min.x + r.x0 as f32, canvas.min.y + r.y0 as f32),
        egui::pos2(canvas.min.x + r.x1 as f32, canvas.min.y + r.y1 as f32),
    )
}

fn paint(painter: &egui::Painter, canvas: egui::Rect, frame: &SceneFrame, hovered: Option<icicle::NodeId>) {
    for item in &frame.items {
        let r = to_screen(canvas, frame.transform.transform_rect_bbox(item.rect));
        if !r.intersects(canvas) || item.opacity <= 0.0 {
            continue;
        }
        let fill = if hovered == Some(item.id) && !item.exiting {
            brighten(item.fill, 30)
        } else {
            item.fill
        };
        painter.rect_filled(r, 0.0, fill.gamma_multiply(item.opacity as f32));

        let Some(label) = &item.label else { continue };
        let alpha = label.opacity * item.opacity;
        if alpha < MIN_LABEL_ALPHA || label.text.is_empty() {
            continue;
        }
        // The anchor moves with the group transform; text follows the counter-scale.
        let anchor = frame.transform * label.anchor;
        let pos = egui::pos2(canvas.min.x + anchor.x as f32, canvas.min.y + anchor.y as f32);
        let align = match label.align {
            LabelAlign::Start => egui::Align2::LEFT_CENTER,
            LabelAlign::Middle => egui::Align2::CENTER_CENTER,
            LabelAlign::End => egui::Align2::RIGHT_CENTER,
        };
        let size = (LABEL_FONT_SIZE as f64 * label_scale(frame.transform, label.counter_scale)) as f32;
        painter.with_clip_rect(r.intersect(canvas)).text(
            pos,
            align,
            &label.text,
            egui::FontId::proportional(size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)),
            text_color(label.light).gamma_multiply(alpha as f32),
        );
    }
}

/// On-screen text scale: the group zoom times the label's counter-scale.
/// Only the zoom axis differs from 1, so the product of both axes is that factor.
fn label_scale(group: kurbo::Affine, counter: Vec2) -> f64 {
    let [sx, _, _, sy, _, _] = group.as_coeffs();
    sx * counter.x * sy * counter.y
}

// ===================== Colors =====================

const PALETTE: [(u8, u8, u8); 8] = [
    (66, 133, 244),  // blue
    (52, 168, 83),   // green
    (251, 188, 4),   // yellow
    (234, 67, 53),   // red
    (171, 71, 188),  // purple
    (0, 172, 193),   // teal
    (255, 112, 67),  // orange
    (63, 81, 181),   // indigo
];

fn darken(c: u8, depth: usize) -> u8 {
    let factor = 1.0 - (depth as f32 * 0.12).min(0.45);
    (c as f32 * factor) as u8
}

fn brighten(c: egui::Color32, by: u8) -> egui::Color32 {
    egui::Color32::from_rgb(c.r().saturating_add(by), c.g().saturating_add(by), c.b().saturating_add(by))
}

/// Hue from the top-level entry the node lives under, shade from its depth.
/// Files are lighter than folders.
fn node_color(base: &Path, node: &FileNode) -> egui::Color32 {
    let Ok(rel) = node.path.strip_prefix(base) else {
        return egui::Color32::from_gray(90);
    };
    let mut parts = rel.components();
    let Some(top) = parts.next() else {
        return egui::Color32::from_gray(90);
    };
    let depth = parts.count();
    let hue = top
        .as_os_str()
        .to_string_lossy()
        .bytes()
        .fold(0usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));

    let (r, g, b) = PALETTE[hue % PALETTE.len()];
    let (r, g, b) = (darken(r, depth), darken(g, depth), darken(b, depth));
    if node.is_dir {
        egui::Color32::from_rgb(r, g, b)
    } else {
        let lighten = |c: u8| c.saturating_add(50).min(230);
        egui::Color32::from_rgb(lighten(r), lighten(g), lighten(b))
    }
}

// ===================== Helpers =====================

fn list_disks() -> Vec<(String, PathBuf)> {
    let disks = sysinfo::Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .map(|d| {
            let mount = d.mount_point().to_path_buf();
            (mount.display().to_string(), mount)
        })
        .collect()
}

pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;
    const TB: u64 = 1024 * GB;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.0} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

fn format_count(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_use_binary_units() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2 KB");
        assert_eq!(format_size(3 * 1024 * 1024 / 2), "1.5 MB");
    }

    #[test]
    fn settled_labels_keep_nominal_size() {
        let group = kurbo::Affine::new([1.0, 0.0, 0.0, 4.0, 0.0, -300.0]);
        assert_eq!(label_scale(group, Vec2::new(1.0, 0.25)), 1.0);
        // Mid-transition the label still counter-scales for the old zoom.
        assert_eq!(label_scale(group, Vec2::new(1.0, 0.5)), 2.0);
    }

    #[test]
    fn counts_are_abbreviated() {
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(12_345), "12.3K");
    }

    #[test]
    fn files_are_lighter_than_their_folder() {
        let base = Path::new("/scan");
        let dir = FileNode {
            name: "docs".into(),
            path: base.join("docs"),
            size: 10,
            is_dir: true,
            children: Vec::new(),
        };
        let file = FileNode {
            name: "a".into(),
            path: base.join("docs/a"),
            size: 10,
            is_dir: false,
            children: Vec::new(),
        };
        let d = node_color(base, &dir);
        let f = node_color(base, &file);
        assert!(f.r() as u32 + f.g() as u32 + f.b() as u32 > d.r() as u32 + d.g() as u32 + d.b() as u32);
    }
}
