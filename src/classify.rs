//! Bind-set classification
//!
//! Decides, from the whole scene, which joint chains and which meshes took
//! part in skin binding:
//!
//! - a joint chain qualifies when any node under its topmost joint has a
//!   pose-snapshot (`dagPose`) connection;
//! - a mesh qualifies when it is a result shape (not an "Orig" intermediate)
//!   and the geometry of at least one skin cluster.

use crate::errors::Result;
use crate::query;
use crate::scene::{NodeHandle, NodeKind, SceneGraph};

/// Joint roots and meshes that took part in skin binding, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindSet {
    pub roots: Vec<NodeHandle>,
    /// Result shapes
    pub meshes: Vec<NodeHandle>,
}

impl BindSet {
    pub fn classify<G: SceneGraph + ?Sized>(graph: &G) -> Result<Self> {
        Ok(Self {
            roots: bind_roots(graph)?,
            meshes: bind_meshes(graph)?,
        })
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty() && self.meshes.is_empty()
    }
}

/// Topmost joint of every chain in the scene, deduplicated.
pub fn joint_roots<G: SceneGraph + ?Sized>(graph: &G) -> Result<Vec<NodeHandle>> {
    let mut roots = Vec::new();
    for joint in graph.nodes_of_kind(NodeKind::Joint) {
        if let Some(root) = query::root_of(graph, joint, Some(NodeKind::Joint))?
            && !roots.contains(&root)
        {
            roots.push(root);
        }
    }
    Ok(roots)
}

/// `root` or one of its descendants has a pose-snapshot connection.
pub fn is_bind_chain<G: SceneGraph + ?Sized>(graph: &G, root: NodeHandle) -> Result<bool> {
    if query::has_connection(graph, root, NodeKind::DagPose)? {
        return Ok(true);
    }
    for node in query::descendants(graph, root)? {
        if query::has_connection(graph, node, NodeKind::DagPose)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Joint roots whose chain was captured in a bind pose.
pub fn bind_roots<G: SceneGraph + ?Sized>(graph: &G) -> Result<Vec<NodeHandle>> {
    let mut out = Vec::new();
    for root in joint_roots(graph)? {
        if is_bind_chain(graph, root)? {
            out.push(root);
        } else {
            log::debug!("Skipping joint chain {}: no bind pose", query::full_path(graph, root)?);
        }
    }
    Ok(out)
}

/// Result shapes driven by at least one skin cluster, in skin-cluster order.
pub fn bind_meshes<G: SceneGraph + ?Sized>(graph: &G) -> Result<Vec<NodeHandle>> {
    let mut out = Vec::new();
    for deformer in graph.nodes_of_kind(NodeKind::SkinCluster) {
        let shape = query::geometry_of(graph, deformer)?;
        if !graph.contains(shape) || query::is_intermediate(graph.name(shape)?) {
            continue;
        }
        if !out.contains(&shape) {
            out.push(shape);
        }
    }
    Ok(out)
}
