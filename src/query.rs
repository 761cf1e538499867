//! Scene graph query layer
//!
//! Read-only traversal primitives over any [`SceneGraph`]: root finding,
//! typed subtree listing, shape lookup and deformer-connection queries.
//! Every lookup on a missing node fails with `NodeNotFound`; nothing here
//! mutates the scene.

use glam::{Affine3A, Vec3};

use crate::errors::{Result, RigError};
use crate::scene::{NodeHandle, NodeKind, SceneGraph};

/// Name fragment marking an intermediate ("Orig") shape.
pub const INTERMEDIATE_MARKER: &str = "Orig";

/// Intermediate shapes feed blendshape/history chains and are never the
/// rendered result.
#[inline]
#[must_use]
pub fn is_intermediate(name: &str) -> bool {
    name.contains(INTERMEDIATE_MARKER)
}

/// Which shapes [`shape_of`] returns and whether it insists on exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeFilter {
    pub result_only: bool,
    pub require_unique: bool,
}

impl ShapeFilter {
    /// Result shapes, exactly one required.
    pub const UNIQUE_RESULT: Self = Self {
        result_only: true,
        require_unique: true,
    };
    /// Result shapes, any count.
    pub const RESULT: Self = Self {
        result_only: true,
        require_unique: false,
    };
    /// Every shape, no count check.
    pub const ALL: Self = Self {
        result_only: false,
        require_unique: false,
    };
}

/// Highest ancestor of `node` (inclusive).
///
/// With `filter`, the highest ancestor of that kind, or `None` when no
/// ancestor matches. Without a filter, the absolute scene root.
pub fn root_of<G: SceneGraph + ?Sized>(
    graph: &G,
    node: NodeHandle,
    filter: Option<NodeKind>,
) -> Result<Option<NodeHandle>> {
    let mut root = match filter {
        None => Some(node),
        Some(kind) => (graph.kind(node)? == kind).then_some(node),
    };

    let mut current = node;
    while let Some(parent) = graph.parent(current)? {
        match filter {
            None => root = Some(parent),
            Some(kind) => {
                if graph.kind(parent)? == kind {
                    root = Some(parent);
                }
            }
        }
        current = parent;
    }

    Ok(root)
}

/// Every descendant of `node` in depth-first pre-order, excluding `node`.
pub fn descendants<G: SceneGraph + ?Sized>(graph: &G, node: NodeHandle) -> Result<Vec<NodeHandle>> {
    let mut out = Vec::new();
    // 显式栈，逆序压入以保持子节点顺序
    let mut stack: Vec<NodeHandle> = graph.children(node)?.iter().rev().copied().collect();
    while let Some(current) = stack.pop() {
        out.push(current);
        stack.extend(graph.children(current)?.iter().rev());
    }
    Ok(out)
}

/// `root` and all its descendants whose kind is `kind`, depth-first.
pub fn subtree_of_type<G: SceneGraph + ?Sized>(
    graph: &G,
    root: NodeHandle,
    kind: NodeKind,
) -> Result<Vec<NodeHandle>> {
    let mut out = Vec::new();
    if graph.kind(root)? == kind {
        out.push(root);
    }
    for node in descendants(graph, root)? {
        if graph.kind(node)? == kind {
            out.push(node);
        }
    }
    Ok(out)
}

/// Shape children of a transform.
///
/// With `require_unique`, zero or several matching shapes fail with
/// `AmbiguousShape`.
pub fn shape_of<G: SceneGraph + ?Sized>(
    graph: &G,
    transform: NodeHandle,
    filter: ShapeFilter,
) -> Result<Vec<NodeHandle>> {
    let mut shapes = Vec::new();
    for &child in graph.children(transform)? {
        if !graph.kind(child)?.is_shape() {
            continue;
        }
        if filter.result_only && is_intermediate(graph.name(child)?) {
            continue;
        }
        shapes.push(child);
    }

    if filter.require_unique && shapes.len() != 1 {
        return Err(RigError::AmbiguousShape {
            transform: full_path(graph, transform)?,
            count: shapes.len(),
        });
    }
    Ok(shapes)
}

/// The unique result shape of a transform, or the node itself when it is a shape.
pub fn result_shape<G: SceneGraph + ?Sized>(graph: &G, node: NodeHandle) -> Result<NodeHandle> {
    let kind = graph.kind(node)?;
    if kind.is_shape() {
        return Ok(node);
    }
    if !kind.is_transform() {
        return Err(RigError::UnexpectedKind {
            node: full_path(graph, node)?,
            expected: "transform or mesh",
            found: kind,
        });
    }
    Ok(shape_of(graph, node, ShapeFilter::UNIQUE_RESULT)?[0])
}

/// Nodes of `kind` connected to `node`.
pub fn deformers_of<G: SceneGraph + ?Sized>(
    graph: &G,
    node: NodeHandle,
    kind: NodeKind,
) -> Result<Vec<NodeHandle>> {
    let mut out = Vec::new();
    for &other in graph.connections(node)? {
        if graph.kind(other)? == kind {
            out.push(other);
        }
    }
    Ok(out)
}

#[inline]
pub fn has_connection<G: SceneGraph + ?Sized>(graph: &G, node: NodeHandle, kind: NodeKind) -> Result<bool> {
    for &other in graph.connections(node)? {
        if graph.kind(other)? == kind {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Influence joints of a skin deformer, in weight-column order.
pub fn influences_of<G: SceneGraph + ?Sized>(graph: &G, deformer: NodeHandle) -> Result<Vec<NodeHandle>> {
    Ok(graph.skin_cluster(deformer)?.influences.clone())
}

/// The shape a skin deformer drives.
pub fn geometry_of<G: SceneGraph + ?Sized>(graph: &G, deformer: NodeHandle) -> Result<NodeHandle> {
    Ok(graph.skin_cluster(deformer)?.geometry)
}

/// The skin cluster whose geometry is `shape`, if any.
pub fn skin_of<G: SceneGraph + ?Sized>(graph: &G, shape: NodeHandle) -> Result<Option<NodeHandle>> {
    for deformer in deformers_of(graph, shape, NodeKind::SkinCluster)? {
        if geometry_of(graph, deformer)? == shape {
            return Ok(Some(deformer));
        }
    }
    Ok(None)
}

/// Shapes driven by any skin cluster that lists `joint` as an influence.
pub fn skinned_meshes_of<G: SceneGraph + ?Sized>(graph: &G, joint: NodeHandle) -> Result<Vec<NodeHandle>> {
    let mut meshes = Vec::new();
    for deformer in deformers_of(graph, joint, NodeKind::SkinCluster)? {
        let shape = geometry_of(graph, deformer)?;
        if !meshes.contains(&shape) {
            meshes.push(shape);
        }
    }
    Ok(meshes)
}

/// Joints influencing a skinned mesh (transform or shape).
pub fn joints_of_skin<G: SceneGraph + ?Sized>(graph: &G, mesh: NodeHandle) -> Result<Vec<NodeHandle>> {
    let shapes = match graph.kind(mesh)? {
        NodeKind::Mesh => vec![mesh],
        NodeKind::Transform => shape_of(graph, mesh, ShapeFilter::ALL)?,
        found => {
            return Err(RigError::UnexpectedKind {
                node: full_path(graph, mesh)?,
                expected: "transform or mesh",
                found,
            });
        }
    };

    let mut joints = Vec::new();
    for shape in shapes {
        for deformer in deformers_of(graph, shape, NodeKind::SkinCluster)? {
            for joint in influences_of(graph, deformer)? {
                if !joints.contains(&joint) {
                    joints.push(joint);
                }
            }
        }
    }
    Ok(joints)
}

/// Local matrices of `node` and its ancestors, composed root first.
pub fn world_matrix<G: SceneGraph + ?Sized>(graph: &G, node: NodeHandle) -> Result<Affine3A> {
    let mut matrix = graph.transform(node)?.local_matrix();
    let mut current = node;
    while let Some(parent) = graph.parent(current)? {
        matrix = graph.transform(parent)?.local_matrix() * matrix;
        current = parent;
    }
    Ok(matrix)
}

#[inline]
pub fn world_position<G: SceneGraph + ?Sized>(graph: &G, node: NodeHandle) -> Result<Vec3> {
    Ok(world_matrix(graph, node)?.translation.into())
}

/// `|root|child|node` style path.
pub fn full_path<G: SceneGraph + ?Sized>(graph: &G, node: NodeHandle) -> Result<String> {
    let mut parts = vec![graph.name(node)?];
    let mut current = node;
    while let Some(parent) = graph.parent(current)? {
        parts.push(graph.name(parent)?);
        current = parent;
    }

    let mut path = String::new();
    for part in parts.iter().rev() {
        path.push('|');
        path.push_str(part);
    }
    Ok(path)
}

/// Number of ancestors of `node`.
pub fn depth<G: SceneGraph + ?Sized>(graph: &G, node: NodeHandle) -> Result<usize> {
    let mut depth = 0;
    let mut current = node;
    while let Some(parent) = graph.parent(current)? {
        depth += 1;
        current = parent;
    }
    Ok(depth)
}

/// `ancestor` is `node` or one of its ancestors.
pub fn is_ancestor_of<G: SceneGraph + ?Sized>(graph: &G, ancestor: NodeHandle, node: NodeHandle) -> Result<bool> {
    let mut current = Some(node);
    while let Some(n) = current {
        if n == ancestor {
            return Ok(true);
        }
        current = graph.parent(n)?;
    }
    Ok(false)
}
