//! Icicle (partition) charts: layout, orientation, pan/zoom and animated
//! scene reconciliation for hierarchical data.

pub mod anim;
pub mod chart;
pub mod error;
pub mod label;
pub mod orientation;
pub mod partition;
pub mod scanner;
pub mod scene;
pub mod settings;
pub mod tree;
pub mod viewport;
pub mod visibility;

pub use chart::{IcicleChart, Tooltip};
pub use error::{Error, Result};
pub use orientation::{Axis, Orientation};
pub use partition::{Extents, PartitionLayout};
pub use scene::{SceneFrame, SceneItem, SceneLabel};
pub use settings::ChartSettings;
pub use tree::{by_weight_descending, children_fn, Hierarchy, LayoutNode, LayoutTree, NodeId};
pub use viewport::{TransformChange, ViewTransform};
