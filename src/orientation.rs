use kurbo::{Rect, Size};
use serde::{Deserialize, Serialize};

use crate::partition::Extents;
use crate::tree::LayoutNode;

/// Direction in which tree depth grows on screen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    TopDown,
    BottomUp,
    #[default]
    LeftRight,
    RightLeft,
}

/// A screen axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl Orientation {
    pub const ALL: [Orientation; 4] = [
        Orientation::TopDown,
        Orientation::BottomUp,
        Orientation::LeftRight,
        Orientation::RightLeft,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Orientation::TopDown => "Top-down",
            Orientation::BottomUp => "Bottom-up",
            Orientation::LeftRight => "Left-right",
            Orientation::RightLeft => "Right-left",
        }
    }

    /// Depth runs horizontally (left-right / right-left).
    pub fn is_horizontal(self) -> bool {
        matches!(self, Orientation::LeftRight | Orientation::RightLeft)
    }

    /// Screen axis carrying the size (weight) dimension. The only pannable axis.
    pub fn size_axis(self) -> Axis {
        if self.is_horizontal() {
            Axis::Y
        } else {
            Axis::X
        }
    }

    /// Canvas extent along the size axis.
    pub fn size_extent(self, canvas: Size) -> f64 {
        match self.size_axis() {
            Axis::X => canvas.width,
            Axis::Y => canvas.height,
        }
    }

    pub fn layout_extents(self, canvas: Size) -> Extents {
        if self.is_horizontal() {
            Extents { size: canvas.height, depth: canvas.width }
        } else {
            Extents { size: canvas.width, depth: canvas.height }
        }
    }

    /// Map a node's layout extents onto screen coordinates (before pan/zoom).
    pub fn map<T>(self, node: &LayoutNode<T>, canvas: Size) -> Rect {
        match self {
            Orientation::TopDown => {
                Rect::new(node.size_start, node.depth_start, node.size_end, node.depth_end)
            }
            Orientation::BottomUp => Rect::new(
                node.size_start,
                canvas.height - node.depth_end,
                node.size_end,
                canvas.height - node.depth_start,
            ),
            Orientation::LeftRight => {
                Rect::new(node.depth_start, node.size_start, node.depth_end, node.size_end)
            }
            Orientation::RightLeft => Rect::new(
                canvas.width - node.depth_end,
                node.size_start,
                canvas.width - node.depth_start,
                node.size_end,
            ),
        }
    }
}
