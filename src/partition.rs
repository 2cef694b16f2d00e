use crate::tree::{LayoutNode, LayoutTree, NodeId};

/// Layout extents: the size axis spans weight, the depth axis spans tree levels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Extents {
    pub size: f64,
    pub depth: f64,
}

/// Relative slack under which children are treated as consuming the whole parent.
const TILE_EPSILON: f64 = 1e-9;

/// Hierarchical partition (icicle) layout.
///
/// Every node's size-axis interval is diced among its children in sibling order,
/// proportionally to their summed weight, with no gap between neighbours. Each
/// depth level gets an equal band on the depth axis regardless of subtree size.
pub struct PartitionLayout<T> {
    tree: LayoutTree<T>,
    extents: Extents,
    exclude_root: bool,
    laid_out: Vec<NodeId>,
}

impl<T> PartitionLayout<T> {
    pub fn compute(mut tree: LayoutTree<T>, extents: Extents, exclude_root: bool) -> Self {
        let levels = (tree.max_depth() + 1) as f64;
        let band = extents.depth / levels;

        let nodes = tree.nodes_mut();
        nodes[0].size_start = 0.0;
        nodes[0].size_end = extents.size;

        // Pre-order guarantees a parent is placed before its children.
        for i in 0..nodes.len() {
            let depth = nodes[i].depth as f64;
            nodes[i].depth_start = band * depth;
            nodes[i].depth_end = band * (depth + 1.0);
            dice_children(nodes, i);
        }

        if exclude_root {
            rescale_without_root(nodes, band, extents.depth);
        }

        let laid_out = if exclude_root && extents.depth - band <= 0.0 {
            // Nothing lives below a lone root.
            Vec::new()
        } else {
            nodes
                .iter()
                .filter(|n| n.depth_start >= 0.0)
                .map(|n| n.id)
                .collect()
        };

        PartitionLayout {
            tree,
            extents,
            exclude_root,
            laid_out,
        }
    }

    pub fn tree(&self) -> &LayoutTree<T> {
        &self.tree
    }

    pub fn extents(&self) -> Extents {
        self.extents
    }

    pub fn excludes_root(&self) -> bool {
        self.exclude_root
    }

    /// Ids of the nodes that take part in rendering, in pre-order.
    pub fn laid_out(&self) -> &[NodeId] {
        &self.laid_out
    }

    pub fn iter(&self) -> impl Iterator<Item = &LayoutNode<T>> + '_ {
        self.laid_out.iter().filter_map(|&id| self.tree.get(id))
    }

    pub fn node(&self, id: NodeId) -> Option<&LayoutNode<T>> {
        self.tree.get(id)
    }
}

fn dice_children<T>(nodes: &mut [LayoutNode<T>], parent: usize) {
    let count = nodes[parent].children.len();
    if count == 0 {
        return;
    }

    let start = nodes[parent].size_start;
    let end = nodes[parent].size_end;
    let weight = nodes[parent].weight;
    let k = if weight > 0.0 { (end - start) / weight } else { 0.0 };

    let mut cursor = start;
    let mut consumed = 0.0;
    for c in 0..count {
        let child = nodes[parent].children[c].index();
        consumed += nodes[child].weight;
        nodes[child].size_start = cursor;
        cursor += nodes[child].weight * k;
        nodes[child].size_end = cursor;
    }

    // Without own weight on the parent the children must tile it exactly.
    if weight > 0.0 && (weight - consumed).abs() <= weight * TILE_EPSILON {
        let last = nodes[parent].children[count - 1].index();
        nodes[last].size_end = end;
    }
}

fn rescale_without_root<T>(nodes: &mut [LayoutNode<T>], root_band_end: f64, depth_extent: f64) {
    let span = depth_extent - root_band_end;
    if span <= 0.0 {
        return;
    }
    let remap = |y: f64| (y - root_band_end) / span * depth_extent;
    for node in nodes.iter_mut() {
        node.depth_start = remap(node.depth_start);
        node.depth_end = remap(node.depth_end);
    }
}
