//! The scene-graph service boundary.
//!
//! Extraction never touches scene storage directly: every query and
//! mutation goes through [`SceneGraph`], so the same core can drive the
//! in-memory [`Scene`](crate::scene::Scene) or a host application bridge.
//!
//! Queries take `&self` and never mutate. Mutations may be refused by the
//! service; refusals of delete/re-parent surface as
//! [`RigError::PruneConflict`](crate::errors::RigError::PruneConflict).

use crate::errors::Result;
use crate::scene::channel::{Channel, Channels};
use crate::scene::geometry::MeshData;
use crate::scene::skin::{BindPose, SkinCluster, WeightTable};
use crate::scene::transform::{FreezeChannels, Transform};
use crate::scene::{NodeHandle, NodeKind};

/// Flags for [`SceneGraph::duplicate`].
///
/// Children are always copied, never instanced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DuplicateOptions {
    /// Carry pose-snapshot memberships over to the copies. Skin and history
    /// connections are never duplicated.
    pub input_connections: bool,
}

pub trait SceneGraph {
    // ========================================================================
    // Queries
    // ========================================================================

    fn contains(&self, node: NodeHandle) -> bool;

    fn kind(&self, node: NodeHandle) -> Result<NodeKind>;

    /// Short name (may be shared by several nodes).
    fn name(&self, node: NodeHandle) -> Result<&str>;

    fn parent(&self, node: NodeHandle) -> Result<Option<NodeHandle>>;

    fn children(&self, node: NodeHandle) -> Result<&[NodeHandle]>;

    /// Dependency nodes connected to `node` (or DAG nodes connected to a
    /// dependency node).
    fn connections(&self, node: NodeHandle) -> Result<&[NodeHandle]>;

    fn transform(&self, node: NodeHandle) -> Result<&Transform>;

    fn channels(&self, node: NodeHandle) -> Result<&Channels>;

    /// Every node of `kind`, DAG nodes in depth-first scene order followed
    /// by dependency nodes in creation order.
    fn nodes_of_kind(&self, kind: NodeKind) -> Vec<NodeHandle>;

    fn mesh(&self, shape: NodeHandle) -> Result<&MeshData>;

    fn skin_cluster(&self, deformer: NodeHandle) -> Result<&SkinCluster>;

    fn bind_pose(&self, pose: NodeHandle) -> Result<&BindPose>;

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Creates an empty transform at the scene root.
    fn create_group(&mut self, name: &str) -> NodeHandle;

    /// Deep-copies a DAG subtree next to the original. Passing a shape
    /// duplicates its transform. Returns the copy of the top node.
    fn duplicate(&mut self, node: NodeHandle, options: DuplicateOptions) -> Result<NodeHandle>;

    /// Moves `node` under `parent` (scene root for `None`), preserving its
    /// world transform.
    fn reparent(&mut self, node: NodeHandle, parent: Option<NodeHandle>) -> Result<()>;

    /// Deletes `node` and everything below it.
    fn delete(&mut self, node: NodeHandle) -> Result<()>;

    /// Strips construction history from a transform's shapes: deformers
    /// driving them and intermediate shapes are removed.
    fn delete_history(&mut self, node: NodeHandle) -> Result<()>;

    /// Bakes the selected channels into the rest state (`makeIdentity -apply`).
    fn freeze_transform(&mut self, node: NodeHandle, channels: FreezeChannels) -> Result<()>;

    /// Unlocks every channel, makes it keyable and shows the node.
    fn restore_channels(&mut self, node: NodeHandle) -> Result<()>;

    fn set_channel_lock(&mut self, node: NodeHandle, channel: Channel, locked: bool) -> Result<()>;

    /// Node-level lock (`lockNode`). Locked nodes refuse re-parent and delete.
    fn set_node_lock(&mut self, node: NodeHandle, locked: bool) -> Result<()>;

    fn set_visibility(&mut self, node: NodeHandle, visible: bool) -> Result<()>;

    /// Binds `geometry` (transform or shape) to `influences` with a fresh
    /// skin cluster. Each vertex starts fully bound to its nearest influence.
    fn create_skin_cluster(&mut self, influences: &[NodeHandle], geometry: NodeHandle) -> Result<NodeHandle>;

    fn set_skin_weights(&mut self, deformer: NodeHandle, weights: WeightTable) -> Result<()>;

    /// Creates a transform named `name` holding a new mesh shape. Returns the transform.
    fn create_mesh(&mut self, name: &str, data: MeshData, parent: Option<NodeHandle>) -> Result<NodeHandle>;

    fn rename(&mut self, node: NodeHandle, name: &str) -> Result<()>;
}
