//! JSON scene descriptions
//!
//! A flat, name-referenced model of a scene that can be loaded into a
//! [`Scene`]: DAG nodes listed parents first, then skin clusters and pose
//! snapshots referring to nodes by name. Names must be unique within a
//! description.
//!
//! ```json
//! {
//!   "nodes": [
//!     { "name": "hip", "kind": "joint" },
//!     { "name": "knee", "kind": "joint", "parent": "hip", "translation": [0, -4, 0] },
//!     { "name": "leg", "kind": "transform" },
//!     { "name": "legShape", "kind": "mesh", "parent": "leg",
//!       "mesh": { "positions": [[0, 0, 0], [0, -4, 0], [1, -2, 0]], "faces": [[0, 1, 2]] } }
//!   ],
//!   "skin_clusters": [
//!     { "name": "skinCluster1", "geometry": "legShape", "influences": ["hip", "knee"] }
//!   ],
//!   "bind_poses": [{ "name": "bindPose1", "members": ["hip", "knee"] }]
//! }
//! ```
//!
//! [`NodeSummary`] goes the other way and dumps a subtree for reporting.

use std::path::Path;

use glam::{Quat, Vec3};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, RigError};
use crate::scene::channel::Channel;
use crate::scene::geometry::MeshData;
use crate::scene::graph::SceneGraph;
use crate::scene::node::Node;
use crate::scene::scene::Scene;
use crate::scene::skin::WeightTable;
use crate::scene::{NodeHandle, NodeKind};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneDescription {
    #[serde(default)]
    pub nodes: Vec<NodeDescription>,
    #[serde(default)]
    pub skin_clusters: Vec<SkinClusterDescription>,
    #[serde(default)]
    pub bind_poses: Vec<BindPoseDescription>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDescription {
    pub name: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub translation: Option<Vec3>,
    /// Rotate channels in degrees
    #[serde(default)]
    pub rotation: Option<Vec3>,
    #[serde(default)]
    pub scale: Option<Vec3>,
    #[serde(default)]
    pub joint_orient: Option<Quat>,
    /// Channels locked in the channel box, e.g. `["tx", "visibility"]`
    #[serde(default)]
    pub locked_channels: Vec<String>,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub intermediate: bool,
    /// Geometry for `mesh` nodes
    #[serde(default)]
    pub mesh: Option<MeshData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkinClusterDescription {
    pub name: String,
    pub geometry: String,
    pub influences: Vec<String>,
    /// One row per vertex. Omitted: every vertex bound to its nearest influence.
    #[serde(default)]
    pub weights: Option<Vec<Vec<f32>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindPoseDescription {
    pub name: String,
    pub members: Vec<String>,
}

impl SceneDescription {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Instantiates the description into a fresh scene.
    pub fn build(&self) -> Result<Scene> {
        let mut scene = Scene::new();
        let mut handles: FxHashMap<&str, NodeHandle> = FxHashMap::default();

        for desc in &self.nodes {
            if handles.contains_key(desc.name.as_str()) {
                return Err(RigError::InvalidDescription(format!(
                    "duplicate node name '{}'",
                    desc.name
                )));
            }
            let parent = match &desc.parent {
                Some(name) => Some(lookup(&handles, name)?),
                None => None,
            };
            let handle = build_dag_node(&mut scene, desc, parent)?;
            handles.insert(&desc.name, handle);
        }

        for desc in &self.skin_clusters {
            let geometry = lookup(&handles, &desc.geometry)?;
            let influences = desc
                .influences
                .iter()
                .map(|name| lookup(&handles, name))
                .collect::<Result<Vec<_>>>()?;

            let deformer = scene.create_skin_cluster(&influences, geometry)?;
            if let Some(rows) = &desc.weights {
                let table = WeightTable::from_rows(rows, influences.len())?;
                scene.set_skin_weights(deformer, table)?;
            }
            scene.rename(deformer, &desc.name)?;
        }

        for desc in &self.bind_poses {
            let members = desc
                .members
                .iter()
                .map(|name| lookup(&handles, name))
                .collect::<Result<Vec<_>>>()?;
            scene.add_bind_pose(&desc.name, &members)?;
        }

        log::info!(
            "Loaded scene: {} nodes, {} skin clusters, {} bind poses",
            self.nodes.len(),
            self.skin_clusters.len(),
            self.bind_poses.len()
        );
        Ok(scene)
    }
}

fn lookup(handles: &FxHashMap<&str, NodeHandle>, name: &str) -> Result<NodeHandle> {
    handles
        .get(name)
        .copied()
        .ok_or_else(|| RigError::InvalidDescription(format!("unknown node '{name}'")))
}

fn build_dag_node(scene: &mut Scene, desc: &NodeDescription, parent: Option<NodeHandle>) -> Result<NodeHandle> {
    if !desc.kind.is_dag() {
        return Err(RigError::InvalidDescription(format!(
            "'{}': {} nodes belong in skin_clusters/bind_poses",
            desc.name,
            desc.kind.as_str()
        )));
    }

    if desc.kind.is_shape() {
        let Some(transform) = parent else {
            return Err(RigError::InvalidDescription(format!(
                "mesh '{}' needs a transform parent",
                desc.name
            )));
        };
        let data = desc.mesh.clone().unwrap_or_default();
        let shape = scene.add_shape(&desc.name, data, transform, desc.intermediate)?;
        if let Some(node) = scene.get_node_mut(shape) {
            node.locked = desc.locked;
        }
        return Ok(shape);
    }

    let mut node = Node::new(&desc.name, desc.kind);
    if let Some(t) = desc.translation {
        node.transform.translation = t;
    }
    if let Some(r) = desc.rotation {
        node.transform.rotation = Vec3::new(r.x.to_radians(), r.y.to_radians(), r.z.to_radians());
    }
    if let Some(s) = desc.scale {
        node.transform.scale = s;
    }
    if let Some(jo) = desc.joint_orient {
        node.transform.joint_orient = jo.normalize();
    }
    for name in &desc.locked_channels {
        let channel = parse_channel(name)
            .ok_or_else(|| RigError::InvalidDescription(format!("unknown channel '{name}'")))?;
        node.channels.locked |= channel;
        node.channels.keyable.remove(channel);
    }
    node.locked = desc.locked;

    if let Some(p) = parent
        && !scene.kind(p)?.is_transform()
    {
        return Err(RigError::InvalidDescription(format!(
            "'{}' cannot be parented under a shape",
            desc.name
        )));
    }
    Ok(scene.insert_node(node, parent))
}

fn parse_channel(name: &str) -> Option<Channel> {
    let channel = match name {
        "tx" => Channel::TX,
        "ty" => Channel::TY,
        "tz" => Channel::TZ,
        "rx" => Channel::RX,
        "ry" => Channel::RY,
        "rz" => Channel::RZ,
        "sx" => Channel::SX,
        "sy" => Channel::SY,
        "sz" => Channel::SZ,
        "t" | "translate" => Channel::TRANSLATE,
        "r" | "rotate" => Channel::ROTATE,
        "s" | "scale" => Channel::SCALE,
        "v" | "visibility" => Channel::VISIBILITY,
        _ => return None,
    };
    Some(channel)
}

/// Serializable dump of a DAG subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub name: String,
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertex_count: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<NodeSummary>,
}

impl NodeSummary {
    pub fn capture<G: SceneGraph + ?Sized>(graph: &G, node: NodeHandle) -> Result<Self> {
        let kind = graph.kind(node)?;
        let vertex_count = if kind.is_shape() {
            Some(graph.mesh(node)?.vertex_count())
        } else {
            None
        };
        let children = graph
            .children(node)?
            .iter()
            .map(|&child| Self::capture(graph, child))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: graph.name(node)?.to_string(),
            kind,
            vertex_count,
            children,
        })
    }

    /// Number of nodes of `kind` in the summary, itself included.
    #[must_use]
    pub fn count(&self, kind: NodeKind) -> usize {
        usize::from(self.kind == kind) + self.children.iter().map(|c| c.count(kind)).sum::<usize>()
    }
}
