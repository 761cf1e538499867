//! Extraction pipeline
//!
//! [`Pipeline`] runs the three stages in their mandatory order and threads
//! their state through an explicit [`ExtractionContext`]:
//!
//! ```text
//! classify ──► extract_clean_bone ──► extract_clean_mesh ──► transfer_weight
//!   BindSet       joint group           mesh group             merged mesh
//!                                       sources / targets
//! ```
//!
//! Each run starts from a fresh context. Nothing is rolled back on failure:
//! groups created before the failing stage stay in the scene.
//!
//! ```rust,ignore
//! let mut scene = SceneDescription::load("rig.json")?.build()?;
//! let ctx = Pipeline::new(ExtractSettings::default()).run(&mut scene)?;
//! let summary = ExtractionSummary::capture(&scene, &ctx)?;
//! ```

use serde::Serialize;

use crate::audit;
use crate::classify::BindSet;
use crate::errors::{Result, RigError};
use crate::extract::{self, SkippedRoot};
use crate::query;
use crate::scene::{NodeHandle, NodeSummary, SceneGraph};
use crate::settings::ExtractSettings;
use crate::transfer::{self, TransferReport, TransferStats};
use crate::utils::names::{self, Rename};

/// State of one extraction run.
#[derive(Debug, Clone, Default)]
pub struct ExtractionContext {
    pub bind_set: BindSet,
    /// Renames applied before classification
    pub renames: Vec<Rename>,
    /// Source joints whose rotate channels were not zero
    pub rotated_joints: Vec<NodeHandle>,

    pub joint_group: Option<NodeHandle>,
    pub skipped_roots: Vec<SkippedRoot>,

    pub mesh_group: Option<NodeHandle>,
    /// Original bind shapes, aligned with `targets`
    pub sources: Vec<NodeHandle>,
    /// Duplicated result shapes
    pub targets: Vec<NodeHandle>,

    pub transfer: Option<TransferReport>,
}

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    settings: ExtractSettings,
}

impl Pipeline {
    #[must_use]
    pub fn new(settings: ExtractSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &ExtractSettings {
        &self.settings
    }

    /// Starts a run: optional duplicate renaming, then classification.
    pub fn classify<G: SceneGraph + ?Sized>(&self, graph: &mut G) -> Result<ExtractionContext> {
        let renames = if self.settings.rename_duplicates {
            names::rename_duplicates(graph)?
        } else {
            Vec::new()
        };

        let bind_set = BindSet::classify(&*graph)?;
        log::info!(
            "Classified {} bind root(s) and {} bind mesh(es)",
            bind_set.roots.len(),
            bind_set.meshes.len()
        );

        let mut rotated_joints = Vec::new();
        for &root in &bind_set.roots {
            rotated_joints.extend(audit::joints_with_rotation(&*graph, root)?);
        }

        Ok(ExtractionContext {
            bind_set,
            renames,
            rotated_joints,
            ..ExtractionContext::default()
        })
    }

    /// Duplicates the bind joint chains into the clean joint group.
    pub fn extract_clean_bone<G: SceneGraph + ?Sized>(
        &self,
        graph: &mut G,
        ctx: &mut ExtractionContext,
    ) -> Result<NodeHandle> {
        let joints = extract::extract_joints(graph, &ctx.bind_set.roots, &self.settings.joint_group_name)?;
        ctx.joint_group = Some(joints.group);
        ctx.skipped_roots = joints.skipped;
        Ok(joints.group)
    }

    /// Duplicates the bind meshes into the clean mesh group and records the
    /// source/target correspondence in `ctx`.
    pub fn extract_clean_mesh<G: SceneGraph + ?Sized>(
        &self,
        graph: &mut G,
        ctx: &mut ExtractionContext,
    ) -> Result<NodeHandle> {
        if ctx.joint_group.is_none() {
            return Err(RigError::StageOrder {
                stage: "extract_clean_mesh",
                requires: "extract_clean_bone",
            });
        }

        let meshes = extract::extract_meshes(graph, &ctx.bind_set.meshes, &self.settings.mesh_group_name)?;
        ctx.mesh_group = Some(meshes.group);
        ctx.sources = meshes.sources;
        ctx.targets = meshes.targets;
        Ok(meshes.group)
    }

    /// Binds, copies weights and merges. Returns the output node: the merged
    /// mesh, the single extracted mesh or the (empty) mesh group.
    pub fn transfer_weight<G: SceneGraph + ?Sized>(
        &self,
        graph: &mut G,
        ctx: &mut ExtractionContext,
    ) -> Result<NodeHandle> {
        let (Some(joint_group), Some(mesh_group)) = (ctx.joint_group, ctx.mesh_group) else {
            return Err(RigError::StageOrder {
                stage: "transfer_weight",
                requires: "extract_clean_bone and extract_clean_mesh",
            });
        };

        let report = transfer::transfer_weight(
            graph,
            joint_group,
            mesh_group,
            &ctx.sources,
            &ctx.targets,
            &self.settings,
        )?;
        let output = report.output.node();
        ctx.mesh_group = Some(report.mesh_group);
        ctx.transfer = Some(report);
        Ok(output)
    }

    /// All stages in order on a fresh context.
    pub fn run<G: SceneGraph + ?Sized>(&self, graph: &mut G) -> Result<ExtractionContext> {
        let mut ctx = self.classify(graph)?;
        self.extract_clean_bone(graph, &mut ctx)?;
        self.extract_clean_mesh(graph, &mut ctx)?;
        self.transfer_weight(graph, &mut ctx)?;
        Ok(ctx)
    }
}

/// JSON-friendly outcome of a run.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionSummary {
    pub bind_roots: Vec<String>,
    pub bind_meshes: Vec<String>,
    pub renamed: usize,
    pub rotated_joints: Vec<String>,
    pub skipped_roots: Vec<SkippedRoot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joint_group: Option<NodeSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mesh_group: Option<NodeSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer: Option<TransferStats>,
}

impl ExtractionSummary {
    pub fn capture<G: SceneGraph + ?Sized>(graph: &G, ctx: &ExtractionContext) -> Result<Self> {
        let paths = |nodes: &[NodeHandle]| -> Result<Vec<String>> {
            nodes.iter().map(|&n| query::full_path(graph, n)).collect()
        };
        let group = |node: Option<NodeHandle>| -> Result<Option<NodeSummary>> {
            node.map(|n| NodeSummary::capture(graph, n)).transpose()
        };

        Ok(Self {
            bind_roots: paths(&ctx.bind_set.roots)?,
            bind_meshes: paths(&ctx.bind_set.meshes)?,
            renamed: ctx.renames.len(),
            rotated_joints: paths(&ctx.rotated_joints)?,
            skipped_roots: ctx.skipped_roots.clone(),
            joint_group: group(ctx.joint_group)?,
            mesh_group: group(ctx.mesh_group)?,
            transfer: ctx.transfer.as_ref().map(TransferStats::from),
        })
    }
}
