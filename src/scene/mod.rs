//! Scene graph module
//!
//! The scene-graph service boundary and its in-memory implementation:
//! - SceneGraph: query and mutation operations the extraction core relies on
//! - Scene: slotmap-backed implementation used by tests and the driver
//! - Node: capability-tagged node (type tag + connection edges)
//! - Transform / Channels: per-node TRS and channel-box state
//! - MeshData / SkinCluster / BindPose: component data

pub mod node;
pub mod transform;
pub mod channel;
pub mod geometry;
pub mod skin;
pub mod graph;
pub mod scene;
pub mod builder;
pub mod description;

pub use node::Node;
pub use transform::{FreezeChannels, Transform};
pub use channel::{Channel, Channels};
pub use geometry::MeshData;
pub use skin::{BindPose, SkinCluster, WeightTable};
pub use graph::{DuplicateOptions, SceneGraph};
pub use scene::Scene;
pub use builder::NodeBuilder;
pub use description::{NodeSummary, SceneDescription};

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    pub struct NodeHandle;
    pub struct MeshKey;
    pub struct SkinKey;
    pub struct PoseKey;
}

/// Type tag carried by every scene node.
///
/// `Transform`, `Joint` and `Mesh` live in the DAG hierarchy. `SkinCluster`
/// and `DagPose` are dependency nodes: they never have a parent and only
/// relate to the hierarchy through connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Transform,
    Joint,
    Mesh,
    SkinCluster,
    DagPose,
}

impl NodeKind {
    #[inline]
    #[must_use]
    pub fn is_dag(self) -> bool {
        matches!(self, NodeKind::Transform | NodeKind::Joint | NodeKind::Mesh)
    }

    /// Nodes that own a TRS transform and may parent other DAG nodes.
    #[inline]
    #[must_use]
    pub fn is_transform(self) -> bool {
        matches!(self, NodeKind::Transform | NodeKind::Joint)
    }

    #[inline]
    #[must_use]
    pub fn is_shape(self) -> bool {
        matches!(self, NodeKind::Mesh)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Transform => "transform",
            NodeKind::Joint => "joint",
            NodeKind::Mesh => "mesh",
            NodeKind::SkinCluster => "skinCluster",
            NodeKind::DagPose => "dagPose",
        }
    }
}
