use smallvec::SmallVec;

use crate::scene::channel::Channels;
use crate::scene::transform::Transform;
use crate::scene::{MeshKey, NodeHandle, NodeKind, PoseKey, SkinKey};

/// A scene node: hierarchy, type tag and connection edges.
///
/// # Design Principles
///
/// - Keeps only what traversal and filtering need (hierarchy, tags, edges)
/// - Component data (mesh geometry, skin weights, pose members) is stored in
///   the Scene's component maps and referenced by key
/// - Filter predicates are closed functions over `kind` and the kinds of the
///   connected nodes, so no dynamic introspection is needed
///
/// # Hierarchy
///
/// DAG nodes form a tree through parent-child relationships:
/// - `parent`: Optional handle to parent node (None for scene roots)
/// - `children`: Ordered list of child node handles
///
/// Dependency nodes (skin clusters, pose snapshots) never have a parent.
#[derive(Debug, Clone)]
pub struct Node {
    // === Identity ===
    pub(crate) name: String,
    pub(crate) kind: NodeKind,

    // === Core Hierarchy ===
    pub(crate) parent: Option<NodeHandle>,
    pub(crate) children: Vec<NodeHandle>,

    /// Undirected edges to dependency nodes (skin clusters, pose snapshots)
    pub(crate) connections: SmallVec<[NodeHandle; 4]>,

    // === Attributes ===
    pub transform: Transform,
    pub channels: Channels,
    /// Node lock: the scene refuses to delete or re-parent a locked node
    pub locked: bool,
    /// Hidden shape kept only to feed a deformation history chain
    pub intermediate: bool,

    // === Components ===
    pub(crate) mesh: Option<MeshKey>,
    pub(crate) skin: Option<SkinKey>,
    pub(crate) pose: Option<PoseKey>,
}

impl Node {
    #[must_use]
    pub fn new(name: &str, kind: NodeKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            parent: None,
            children: Vec::new(),
            connections: SmallVec::new(),
            transform: Transform::new(),
            channels: Channels::default(),
            locked: false,
            intermediate: false,
            mesh: None,
            skin: None,
            pose: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Returns the parent node handle, if any.
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    /// Returns a read-only slice of child node handles.
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn connections(&self) -> &[NodeHandle] {
        &self.connections
    }

    pub(crate) fn connect(&mut self, other: NodeHandle) {
        if !self.connections.contains(&other) {
            self.connections.push(other);
        }
    }

    pub(crate) fn disconnect(&mut self, other: NodeHandle) {
        self.connections.retain(|c| *c != other);
    }

    pub(crate) fn remove_child(&mut self, child: NodeHandle) {
        if let Some(pos) = self.children.iter().position(|&c| c == child) {
            self.children.remove(pos);
        }
    }
}
