//! Weight transfer and skinned mesh merge
//!
//! Runs after both extractions:
//!
//! 1. every mesh transform under the clean mesh group is bound to every joint
//!    under the clean joint group;
//! 2. weights are re-associated from each source shape to its aligned target
//!    (skipped as a whole when the lists are misaligned);
//! 3. more than one target mesh is merged into a single skinned mesh that
//!    replaces the contents of the clean mesh group.

use serde::Serialize;

use crate::errors::{Result, RigError};
use crate::query::{self, ShapeFilter};
use crate::scene::{MeshData, NodeHandle, NodeKind, SceneGraph, WeightTable};
use crate::settings::ExtractSettings;
use crate::weights::{self, Influence, ReassociationStats};

/// What the clean mesh group holds after the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutput {
    /// Transform of the merged mesh
    Merged(NodeHandle),
    /// Transform of the only extracted mesh
    Single(NodeHandle),
    /// Nothing was bound; the group itself
    Group(NodeHandle),
}

impl TransferOutput {
    #[must_use]
    pub fn node(self) -> NodeHandle {
        match self {
            TransferOutput::Merged(n) | TransferOutput::Single(n) | TransferOutput::Group(n) => n,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransferReport {
    /// The clean mesh group. Differs from the input group after a merge.
    pub mesh_group: NodeHandle,
    pub output: TransferOutput,
    /// Skin clusters created by the bind step. A merge deletes them along
    /// with the old group.
    pub skin_clusters: Vec<NodeHandle>,
    /// Source/target pairs whose weights were re-associated
    pub associations: usize,
    /// Target vertices that received weights
    pub vertices: usize,
    /// The alignment guard skipped the weight copy
    pub skipped: bool,
}

/// Counters of a finished transfer, for logs and summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferStats {
    pub skin_clusters: usize,
    pub associations: usize,
    pub vertices: usize,
    pub skipped: bool,
    pub merged: bool,
}

impl From<&TransferReport> for TransferStats {
    fn from(report: &TransferReport) -> Self {
        Self {
            skin_clusters: report.skin_clusters.len(),
            associations: report.associations,
            vertices: report.vertices,
            skipped: report.skipped,
            merged: matches!(report.output, TransferOutput::Merged(_)),
        }
    }
}

/// Transforms under `group` carrying at least one result shape, depth-first.
pub fn mesh_transforms<G: SceneGraph + ?Sized>(graph: &G, group: NodeHandle) -> Result<Vec<NodeHandle>> {
    let mut out = Vec::new();
    for node in query::descendants(graph, group)? {
        if graph.kind(node)? != NodeKind::Transform {
            continue;
        }
        if !query::shape_of(graph, node, ShapeFilter::RESULT)?.is_empty() {
            out.push(node);
        }
    }
    Ok(out)
}

/// Binds, copies weights and merges.
pub fn transfer_weight<G: SceneGraph + ?Sized>(
    graph: &mut G,
    joint_group: NodeHandle,
    mesh_group: NodeHandle,
    sources: &[NodeHandle],
    targets: &[NodeHandle],
    settings: &ExtractSettings,
) -> Result<TransferReport> {
    // 1. bind
    let joints = query::subtree_of_type(&*graph, joint_group, NodeKind::Joint)?;
    let meshes = mesh_transforms(&*graph, mesh_group)?;
    let mut skin_clusters = Vec::with_capacity(meshes.len());
    for &mesh in &meshes {
        skin_clusters.push(graph.create_skin_cluster(&joints, mesh)?);
    }
    log::info!("Bound {} mesh(es) to {} joint(s)", meshes.len(), joints.len());

    // 2. copy weights
    let mut associations = 0;
    let mut vertices = 0;
    let skipped = sources.len() != targets.len();
    if skipped {
        if settings.strict_alignment {
            return Err(RigError::AlignmentMismatch {
                sources: sources.len(),
                targets: targets.len(),
            });
        }
        log::warn!(
            "Skipping weight copy: {} sources but {} targets",
            sources.len(),
            targets.len()
        );
    } else {
        for (&source, &target) in sources.iter().zip(targets) {
            let stats = copy_skin_weights(graph, source, target)?;
            if stats.fallback_rows > 0 {
                log::debug!(
                    "{} vertex rows of {} had no weight and were bound to the closest joint",
                    stats.fallback_rows,
                    query::full_path(&*graph, target)?
                );
            }
            associations += 1;
            vertices += stats.vertices;
        }
    }

    // 3. merge
    let (mesh_group, output) = match meshes.as_slice() {
        [] => (mesh_group, TransferOutput::Group(mesh_group)),
        [single] => (mesh_group, TransferOutput::Single(*single)),
        _ => {
            let group_name = graph.name(mesh_group)?.to_string();
            let mut shapes = Vec::with_capacity(meshes.len());
            for &mesh in &meshes {
                shapes.push(query::result_shape(&*graph, mesh)?);
            }
            let merged = merge_skinned(graph, &shapes, &settings.merged_mesh_name)?;

            graph.delete(mesh_group)?;
            let group = graph.create_group(&group_name);
            graph.reparent(merged, Some(group))?;
            log::info!("Merged {} meshes into {}", shapes.len(), settings.merged_mesh_name);
            (group, TransferOutput::Merged(merged))
        }
    };

    Ok(TransferReport {
        mesh_group,
        output,
        skin_clusters,
        associations,
        vertices,
        skipped,
    })
}

fn skin_or_err<G: SceneGraph + ?Sized>(graph: &G, shape: NodeHandle) -> Result<NodeHandle> {
    query::skin_of(graph, shape)?.ok_or_else(|| match query::full_path(graph, shape) {
        Ok(path) => RigError::NoSkinCluster(path),
        Err(err) => err,
    })
}

fn influences<'g, G: SceneGraph + ?Sized>(graph: &'g G, joints: &[NodeHandle]) -> Result<Vec<Influence<'g>>> {
    joints
        .iter()
        .map(|&joint| {
            Ok(Influence {
                name: graph.name(joint)?,
                position: query::world_position(graph, joint)?,
            })
        })
        .collect()
}

/// Re-associates the weights of `source`'s skin onto `target`'s skin.
///
/// Vertices are matched by closest world position, influences by short name
/// and then by closest joint; every target row ends up summing to 1.
pub fn copy_skin_weights<G: SceneGraph + ?Sized>(
    graph: &mut G,
    source: NodeHandle,
    target: NodeHandle,
) -> Result<ReassociationStats> {
    let source_skin = skin_or_err(&*graph, source)?;
    let target_skin = skin_or_err(&*graph, target)?;

    let (table, stats) = {
        let graph = &*graph;
        let source_cluster = graph.skin_cluster(source_skin)?;
        let target_cluster = graph.skin_cluster(target_skin)?;

        let source_positions = graph
            .mesh(source)?
            .transformed_positions(&query::world_matrix(graph, source)?);
        let target_positions = graph
            .mesh(target)?
            .transformed_positions(&query::world_matrix(graph, target)?);

        let source_influences = influences(graph, &source_cluster.influences)?;
        let target_influences = influences(graph, &target_cluster.influences)?;
        let map = weights::match_influences(&source_influences, &target_influences)?;

        weights::reassociate(
            &source_positions,
            &source_cluster.weights,
            &map,
            &target_positions,
            &target_influences,
        )?
    };

    graph.set_skin_weights(target_skin, table)?;
    Ok(stats)
}

/// Unites skinned shapes into one new skinned mesh named `name`.
///
/// Vertices are concatenated in world space and the influence set is the
/// union of the inputs' influences, in order of first appearance. The inputs
/// are left untouched. Returns the new transform, created at the scene root.
pub fn merge_skinned<G: SceneGraph + ?Sized>(graph: &mut G, shapes: &[NodeHandle], name: &str) -> Result<NodeHandle> {
    let mut data = MeshData::default();
    let mut union: Vec<NodeHandle> = Vec::new();
    // (首个顶点, 顶点数, 该网格影响骨骼 -> 合并列)
    let mut pieces: Vec<(usize, usize, NodeHandle, Vec<usize>)> = Vec::with_capacity(shapes.len());

    for &shape in shapes {
        let skin = skin_or_err(&*graph, shape)?;
        let cluster = graph.skin_cluster(skin)?;
        let mesh = graph.mesh(shape)?;
        let positions = mesh.transformed_positions(&query::world_matrix(&*graph, shape)?);
        let first = data.append(&positions, &mesh.faces);

        let mut columns = Vec::with_capacity(cluster.influences.len());
        for &joint in &cluster.influences {
            let column = match union.iter().position(|&j| j == joint) {
                Some(column) => column,
                None => {
                    union.push(joint);
                    union.len() - 1
                }
            };
            columns.push(column);
        }
        pieces.push((first, positions.len(), skin, columns));
    }

    let mut table = WeightTable::new(data.vertex_count(), union.len());
    for (first, count, skin, columns) in &pieces {
        let weights = &graph.skin_cluster(*skin)?.weights;
        for vertex in 0..*count {
            let row = table.row_mut(first + vertex);
            for (column, &weight) in weights.row(vertex).iter().enumerate() {
                row[columns[column]] += weight;
            }
        }
    }

    let transform = graph.create_mesh(name, data, None)?;
    let deformer = graph.create_skin_cluster(&union, transform)?;
    graph.set_skin_weights(deformer, table)?;
    Ok(transform)
}
