use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

/// Children accessor: exposes the child list of a raw node.
pub type ChildrenFn<T> = Box<dyn for<'a> Fn(&'a T) -> &'a [Arc<T>]>;
/// Weight accessor: the node's own value, before subtree summing.
pub type WeightFn<T> = Box<dyn Fn(&T) -> f64>;
/// Sibling comparator applied after weights are summed.
pub type SortFn<T> = Box<dyn Fn(&Sibling<'_, T>, &Sibling<'_, T>) -> Ordering>;

/// Raw data with the conventional `children` / `value` / `name` shape.
/// Lets a chart be built without spelling out accessors.
pub trait Hierarchy: Sized {
    fn children(&self) -> &[Arc<Self>];
    fn value(&self) -> f64;
    fn name(&self) -> &str;
}

/// What a sort comparator sees of each sibling.
pub struct Sibling<'a, T> {
    pub data: &'a T,
    /// Summed subtree weight.
    pub weight: f64,
}

/// Box a children accessor. Passing the closure through this bound lets its
/// lifetimes be inferred as higher-ranked.
pub fn children_fn<T, F>(f: F) -> ChildrenFn<T>
where
    F: for<'a> Fn(&'a T) -> &'a [Arc<T>] + 'static,
{
    Box::new(f)
}

/// Sort siblings largest first, like a disk-usage view.
pub fn by_weight_descending<T: 'static>() -> SortFn<T> {
    Box::new(|a: &Sibling<'_, T>, b: &Sibling<'_, T>| b.weight.total_cmp(&a.weight))
}

/// Identity of a layout node: its pre-order position in the indexed tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A node in the layout tree.
/// Each node corresponds to one raw node and carries its partition extents.
pub struct LayoutNode<T> {
    pub id: NodeId,
    pub depth: usize,
    /// Own value plus all descendants.
    pub weight: f64,
    pub size_start: f64,
    pub size_end: f64,
    pub depth_start: f64,
    pub depth_end: f64,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub raw: Arc<T>,
}

impl<T> LayoutNode<T> {
    pub fn size_extent(&self) -> f64 {
        self.size_end - self.size_start
    }

    pub fn depth_extent(&self) -> f64 {
        self.depth_end - self.depth_start
    }
}

/// Arena of layout nodes in pre-order, plus the raw -> layout lookup.
pub struct LayoutTree<T> {
    nodes: Vec<LayoutNode<T>>,
    by_raw: HashMap<usize, NodeId>,
    max_depth: usize,
}

// Intermediate node: weights summed and siblings sorted, ids not yet assigned.
struct Summed<T> {
    raw: Arc<T>,
    weight: f64,
    children: Vec<Summed<T>>,
}

fn raw_key<T>(raw: &T) -> usize {
    raw as *const T as usize
}

fn sum_weights<T>(
    raw: &Arc<T>,
    children: &ChildrenFn<T>,
    weight: &WeightFn<T>,
    sort: Option<&SortFn<T>>,
) -> Summed<T> {
    let mut kids: Vec<Summed<T>> = children(raw.as_ref())
        .iter()
        .map(|c| sum_weights(c, children, weight, sort))
        .collect();
    let total = weight(raw.as_ref()) + kids.iter().map(|c| c.weight).sum::<f64>();

    if let Some(cmp) = sort {
        kids.sort_by(|a, b| {
            cmp(
                &Sibling { data: &*a.raw, weight: a.weight },
                &Sibling { data: &*b.raw, weight: b.weight },
            )
        });
    }

    Summed { raw: Arc::clone(raw), weight: total, children: kids }
}

impl<T> LayoutTree<T> {
    /// Index a raw tree: sum weights bottom-up, sort siblings, assign pre-order ids.
    pub fn build(
        root: &Arc<T>,
        children: &ChildrenFn<T>,
        weight: &WeightFn<T>,
        sort: Option<&SortFn<T>>,
    ) -> Self {
        let summed = sum_weights(root, children, weight, sort);
        let mut tree = LayoutTree {
            nodes: Vec::new(),
            by_raw: HashMap::new(),
            max_depth: 0,
        };
        tree.flatten(summed, 0, None);
        tree
    }

    fn flatten(&mut self, node: Summed<T>, depth: usize, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.max_depth = self.max_depth.max(depth);
        // A raw node reachable twice keeps its first (pre-order) layout node.
        self.by_raw.entry(raw_key(&*node.raw)).or_insert(id);
        self.nodes.push(LayoutNode {
            id,
            depth,
            weight: node.weight,
            size_start: 0.0,
            size_end: 0.0,
            depth_start: 0.0,
            depth_end: 0.0,
            parent,
            children: Vec::new(),
            raw: node.raw,
        });

        let kids: Vec<NodeId> = node
            .children
            .into_iter()
            .map(|c| self.flatten(c, depth + 1, Some(id)))
            .collect();
        self.nodes[id.0].children = kids;
        id
    }

    pub fn root(&self) -> &LayoutNode<T> {
        &self.nodes[0]
    }

    pub fn get(&self, id: NodeId) -> Option<&LayoutNode<T>> {
        self.nodes.get(id.0)
    }

    pub fn nodes(&self) -> &[LayoutNode<T>] {
        &self.nodes
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [LayoutNode<T>] {
        &mut self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Deepest level in the tree (root = 0).
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Find the layout node built from `raw`, if `raw` belongs to this tree.
    pub fn lookup(&self, raw: &T) -> Option<NodeId> {
        self.by_raw.get(&raw_key(raw)).copied()
    }

    pub fn parent_raw(&self, id: NodeId) -> Option<&T> {
        let parent = self.get(id)?.parent?;
        self.get(parent).map(|p| &*p.raw)
    }

    /// Chain from the root down to `id`, inclusive.
    pub fn ancestry(&self, id: NodeId) -> Vec<&LayoutNode<T>> {
        let mut chain = Vec::new();
        let mut cur = self.get(id);
        while let Some(node) = cur {
            chain.push(node);
            cur = node.parent.and_then(|p| self.get(p));
        }
        chain.reverse();
        chain
    }
}
