//! Hierarchy filter / prune engine
//!
//! Pruning keeps only the nodes of a subtree that satisfy a [`Keep`]
//! predicate. A failing node is excised on its own: its (already pruned)
//! children move up to its parent before it is deleted, so everything kept
//! stays reachable from the root.
//!
//! The work is split in three phases:
//!
//! 1. [`PruneSnapshot::capture`] copies the structure of the subtree (parent,
//!    ordered children, kind, connection kinds) out of the scene.
//! 2. [`plan_prune`] decides, without touching the scene, which re-parent and
//!    delete calls are needed.
//! 3. [`apply_plan`] replays those calls against a [`SceneGraph`].
//!
//! Shapes are handled separately by [`delete_shapes`] because the scene can
//! delete shapes but never re-parent them.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::errors::Result;
use crate::query;
use crate::scene::{NodeHandle, NodeKind, SceneGraph};

/// Structural copy of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub handle: NodeHandle,
    pub kind: NodeKind,
    pub parent: Option<NodeHandle>,
    pub children: Vec<NodeHandle>,
    /// Kinds of the dependency nodes connected to this node
    pub connections: SmallVec<[NodeKind; 2]>,
}

/// Immutable copy of a subtree, detached from the scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneSnapshot {
    root: NodeHandle,
    nodes: FxHashMap<NodeHandle, NodeSnapshot>,
}

impl PruneSnapshot {
    pub fn capture<G: SceneGraph + ?Sized>(graph: &G, root: NodeHandle) -> Result<Self> {
        let mut nodes = FxHashMap::default();
        let mut handles = vec![root];
        handles.extend(query::descendants(graph, root)?);

        for handle in handles {
            let mut connections = SmallVec::new();
            for &other in graph.connections(handle)? {
                let kind = graph.kind(other)?;
                if !connections.contains(&kind) {
                    connections.push(kind);
                }
            }
            nodes.insert(
                handle,
                NodeSnapshot {
                    handle,
                    kind: graph.kind(handle)?,
                    parent: graph.parent(handle)?,
                    children: graph.children(handle)?.to_vec(),
                    connections,
                },
            );
        }
        Ok(Self { root, nodes })
    }

    /// Builds a snapshot from hand-made nodes. Children of `root` not listed
    /// in `nodes` are dropped.
    #[must_use]
    pub fn from_nodes(root: NodeHandle, nodes: impl IntoIterator<Item = NodeSnapshot>) -> Self {
        let mut map: FxHashMap<NodeHandle, NodeSnapshot> = nodes.into_iter().map(|n| (n.handle, n)).collect();
        let known: Vec<NodeHandle> = map.keys().copied().collect();
        for node in map.values_mut() {
            node.children.retain(|c| known.contains(c));
        }
        Self { root, nodes: map }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeHandle {
        self.root
    }

    #[must_use]
    pub fn get(&self, handle: NodeHandle) -> Option<&NodeSnapshot> {
        self.nodes.get(&handle)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Handles reachable from the root (inclusive), depth-first pre-order.
    #[must_use]
    pub fn reachable(&self) -> Vec<NodeHandle> {
        let mut out = Vec::new();
        if !self.nodes.contains_key(&self.root) {
            return out;
        }
        let mut stack = vec![self.root];
        while let Some(handle) = stack.pop() {
            out.push(handle);
            if let Some(node) = self.nodes.get(&handle) {
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }

    /// The snapshot as it looks after `plan` ran.
    #[must_use]
    pub fn applied(&self, plan: &PrunePlan) -> Self {
        let mut next = self.clone();
        for step in &plan.steps {
            next.apply_step(*step);
        }
        next
    }

    fn apply_step(&mut self, step: PruneStep) {
        match step {
            PruneStep::Reparent { node, parent } => {
                let old = self.nodes.get(&node).and_then(|n| n.parent);
                if let Some(old) = old
                    && let Some(old_node) = self.nodes.get_mut(&old)
                {
                    old_node.children.retain(|c| *c != node);
                }
                if let Some(new) = parent
                    && let Some(new_node) = self.nodes.get_mut(&new)
                {
                    new_node.children.push(node);
                }
                if let Some(n) = self.nodes.get_mut(&node) {
                    n.parent = parent;
                }
            }
            PruneStep::Delete(node) => {
                let Some(removed) = self.nodes.remove(&node) else {
                    return;
                };
                if let Some(p) = removed.parent
                    && let Some(parent) = self.nodes.get_mut(&p)
                {
                    parent.children.retain(|c| *c != node);
                }
            }
        }
    }
}

/// Retain predicate for [`prune`].
///
/// A predicate only sees a node's own tags ([`NodeSnapshot`]), never the live
/// scene.
#[derive(Clone, Copy)]
pub enum Keep<'a> {
    /// The node's type equals the kind
    Kind(NodeKind),
    /// The node has at least one connection of the kind
    Connected(NodeKind),
    Custom(&'a dyn Fn(&NodeSnapshot) -> bool),
}

impl Keep<'_> {
    #[must_use]
    pub fn matches(&self, node: &NodeSnapshot) -> bool {
        match self {
            Keep::Kind(kind) => node.kind == *kind,
            Keep::Connected(kind) => node.connections.contains(kind),
            Keep::Custom(f) => f(node),
        }
    }
}

impl std::fmt::Debug for Keep<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Keep::Kind(kind) => write!(f, "Keep::Kind({kind:?})"),
            Keep::Connected(kind) => write!(f, "Keep::Connected({kind:?})"),
            Keep::Custom(_) => f.write_str("Keep::Custom(..)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneStep {
    /// Move `node` under `parent` (scene root for `None`)
    Reparent {
        node: NodeHandle,
        parent: Option<NodeHandle>,
    },
    Delete(NodeHandle),
}

/// Ordered mutation calls computed by [`plan_prune`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrunePlan {
    pub steps: Vec<PruneStep>,
}

impl PrunePlan {
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    #[must_use]
    pub fn deletions(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        self.steps.iter().filter_map(|step| match step {
            PruneStep::Delete(node) => Some(*node),
            PruneStep::Reparent { .. } => None,
        })
    }
}

/// Plans the prune of `snapshot` in depth-first post-order.
///
/// A failing node hands its children to its own parent (appended after its
/// remaining siblings), then is deleted. The root is treated like any other
/// node; its parent lies outside the snapshot and is never touched.
#[must_use]
pub fn plan_prune(snapshot: &PruneSnapshot, keep: Keep<'_>) -> PrunePlan {
    let mut sim = snapshot.clone();
    let mut plan = PrunePlan::default();

    // 后序遍历：(节点, 子节点是否已展开)
    let mut stack = vec![(snapshot.root, false)];
    while let Some((handle, expanded)) = stack.pop() {
        let Some(node) = sim.nodes.get(&handle) else {
            continue;
        };
        if !expanded {
            stack.push((handle, true));
            stack.extend(node.children.iter().rev().map(|&c| (c, false)));
            continue;
        }

        if keep.matches(node) {
            continue;
        }

        let parent = node.parent;
        for child in node.children.clone() {
            let step = PruneStep::Reparent { node: child, parent };
            sim.apply_step(step);
            plan.steps.push(step);
        }
        let step = PruneStep::Delete(handle);
        sim.apply_step(step);
        plan.steps.push(step);
    }

    plan
}

/// Outcome of an applied plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub reparented: usize,
    pub deleted: usize,
}

/// Replays `plan` against the scene.
///
/// The first refused step aborts the rest of the plan; the steps already
/// applied stay applied.
pub fn apply_plan<G: SceneGraph + ?Sized>(graph: &mut G, plan: &PrunePlan) -> Result<PruneReport> {
    let mut report = PruneReport::default();
    for step in &plan.steps {
        match *step {
            PruneStep::Reparent { node, parent } => {
                graph.reparent(node, parent)?;
                report.reparented += 1;
            }
            PruneStep::Delete(node) => {
                graph.delete(node)?;
                report.deleted += 1;
            }
        }
        log::trace!("prune step {step:?}");
    }
    Ok(report)
}

/// Deletes every shape in the subtree of `root`. Returns how many were removed.
pub fn delete_shapes<G: SceneGraph + ?Sized>(graph: &mut G, root: NodeHandle) -> Result<usize> {
    let mut shapes = query::subtree_of_type(&*graph, root, NodeKind::Mesh)?;
    // 子节点先删
    shapes.reverse();
    for &shape in &shapes {
        graph.delete(shape)?;
    }
    Ok(shapes.len())
}

/// Snapshot, plan and apply in one call.
pub fn prune<G: SceneGraph + ?Sized>(graph: &mut G, root: NodeHandle, keep: Keep<'_>) -> Result<PruneReport> {
    let snapshot = PruneSnapshot::capture(&*graph, root)?;
    let plan = plan_prune(&snapshot, keep);
    log::debug!(
        "Pruning {} with {keep:?}: {} of {} nodes removed",
        query::full_path(&*graph, root)?,
        plan.deletions().count(),
        snapshot.len()
    );
    apply_plan(graph, &plan)
}
