use kurbo::Size;

use crate::orientation::Orientation;
use crate::partition::PartitionLayout;
use crate::tree::NodeId;
use crate::viewport::ViewTransform;

/// Select the laid-out nodes worth drawing at the current pan/zoom.
///
/// A node survives when its size-axis interval overlaps the visible window and
/// its rendered length (`extent * k`) reaches `min_segment_size` screen points.
/// Zero-extent nodes never survive. The result keeps pre-order.
pub fn visible_nodes<T>(
    layout: &PartitionLayout<T>,
    transform: ViewTransform,
    orientation: Orientation,
    canvas: Size,
    min_segment_size: f64,
) -> Vec<NodeId> {
    let axis = orientation.size_axis();
    let k = transform.k;
    let window_start = transform.invert(0.0, axis);
    let window_end = transform.invert(orientation.size_extent(canvas), axis);

    layout
        .iter()
        .filter(|n| {
            let extent = n.size_extent();
            extent > 0.0
                && n.size_end >= window_start
                && n.size_start <= window_end
                && extent * k >= min_segment_size
        })
        .map(|n| n.id)
        .collect()
}
