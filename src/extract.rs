//! Extraction of clean joint chains and meshes.
//!
//! Both operations duplicate what the classifier selected into a fresh group
//! and normalize the copies; the originals are never modified.

use serde::Serialize;

use crate::errors::{Result, RigError};
use crate::prune::{self, Keep, PruneReport};
use crate::query;
use crate::scene::{DuplicateOptions, FreezeChannels, NodeHandle, NodeKind, SceneGraph};

/// A prune conflict that was logged and skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRoot {
    /// Full path of the original joint root
    pub root: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct JointExtraction {
    pub group: NodeHandle,
    /// Duplicated roots that were pruned successfully
    pub roots: Vec<NodeHandle>,
    pub prune: PruneReport,
    pub skipped: Vec<SkippedRoot>,
}

impl JointExtraction {
    /// Joints now under the clean group.
    pub fn joints<G: SceneGraph + ?Sized>(&self, graph: &G) -> Result<Vec<NodeHandle>> {
        query::subtree_of_type(graph, self.group, NodeKind::Joint)
    }
}

/// Duplicates every bind root into a new group named `group_name` and strips
/// everything that is not a joint.
///
/// Joint translations survive; rotation is baked into the joint orient and
/// scale into the children. A prune conflict under one root is logged and
/// recorded, the other roots continue.
pub fn extract_joints<G: SceneGraph + ?Sized>(
    graph: &mut G,
    bind_roots: &[NodeHandle],
    group_name: &str,
) -> Result<JointExtraction> {
    let group = graph.create_group(group_name);
    let mut extraction = JointExtraction {
        group,
        roots: Vec::with_capacity(bind_roots.len()),
        prune: PruneReport::default(),
        skipped: Vec::new(),
    };

    for &root in bind_roots {
        let dup = graph.duplicate(root, DuplicateOptions::default())?;
        match normalize_joint_root(graph, dup, group) {
            Ok(report) => {
                extraction.roots.push(dup);
                extraction.prune.reparented += report.reparented;
                extraction.prune.deleted += report.deleted;
            }
            Err(err) if err.is_prune_conflict() => {
                let path = query::full_path(&*graph, root)?;
                log::warn!("Prune of {path} aborted: {err}");
                discard_copy(graph, dup)?;
                extraction.skipped.push(SkippedRoot {
                    root: path,
                    reason: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        }
    }

    // 关节清理：只冻结旋转和缩放，平移是绑定偏移
    for node in query::descendants(&*graph, group)? {
        if !graph.kind(node)?.is_transform() {
            continue;
        }
        graph.restore_channels(node)?;
        graph.freeze_transform(node, FreezeChannels::ROTATE | FreezeChannels::SCALE)?;
    }

    log::info!(
        "Extracted {} joint chain(s) into {group_name} ({} skipped)",
        extraction.roots.len(),
        extraction.skipped.len()
    );
    Ok(extraction)
}

fn normalize_joint_root<G: SceneGraph + ?Sized>(
    graph: &mut G,
    dup: NodeHandle,
    group: NodeHandle,
) -> Result<PruneReport> {
    graph.reparent(dup, Some(group))?;

    let shapes = prune::delete_shapes(graph, dup)?;
    let report = prune::prune(graph, dup, Keep::Kind(NodeKind::Joint))?;
    log::debug!(
        "{}: {shapes} shape(s) deleted, {} node(s) pruned",
        query::full_path(&*graph, dup)?,
        report.deleted
    );
    Ok(report)
}

/// Deletes a partially normalized copy, wherever it was left.
fn discard_copy<G: SceneGraph + ?Sized>(graph: &mut G, dup: NodeHandle) -> Result<()> {
    let mut subtree = query::descendants(&*graph, dup)?;
    subtree.push(dup);
    // 锁定状态随复制保留，删除前先解锁
    for node in subtree {
        graph.set_node_lock(node, false)?;
    }
    graph.delete(dup)
}

/// Clean mesh group plus the position-aligned correspondence lists.
#[derive(Debug, Clone)]
pub struct MeshExtraction {
    pub group: NodeHandle,
    /// Original bind shapes
    pub sources: Vec<NodeHandle>,
    /// Result shape of each duplicate, aligned with `sources`
    pub targets: Vec<NodeHandle>,
}

impl MeshExtraction {
    #[inline]
    #[must_use]
    pub fn is_aligned(&self) -> bool {
        self.sources.len() == self.targets.len()
    }
}

/// Duplicates every bind mesh into a new group named `group_name`, freezes
/// all channels and strips construction history.
///
/// `sources[i]` and `targets[i]` always describe the same mesh. A duplicate
/// without exactly one result shape is fatal.
pub fn extract_meshes<G: SceneGraph + ?Sized>(
    graph: &mut G,
    bind_meshes: &[NodeHandle],
    group_name: &str,
) -> Result<MeshExtraction> {
    let group = graph.create_group(group_name);
    let mut extraction = MeshExtraction {
        group,
        sources: Vec::with_capacity(bind_meshes.len()),
        targets: Vec::with_capacity(bind_meshes.len()),
    };

    for &shape in bind_meshes {
        if !graph.kind(shape)?.is_shape() {
            return Err(RigError::UnexpectedKind {
                node: query::full_path(&*graph, shape)?,
                expected: "mesh",
                found: graph.kind(shape)?,
            });
        }

        let dup = graph.duplicate(shape, DuplicateOptions::default())?;
        graph.reparent(dup, Some(group))?;
        graph.restore_channels(dup)?;
        graph.freeze_transform(dup, FreezeChannels::all())?;
        graph.delete_history(dup)?;

        let target = query::result_shape(&*graph, dup)?;
        log::debug!(
            "{} -> {}",
            query::full_path(&*graph, shape)?,
            query::full_path(&*graph, target)?
        );
        extraction.sources.push(shape);
        extraction.targets.push(target);
    }

    log::info!("Extracted {} mesh(es) into {group_name}", extraction.targets.len());
    Ok(extraction)
}
