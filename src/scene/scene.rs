use glam::{Affine3A, Vec3};
use slotmap::SlotMap;

use crate::errors::{Result, RigError};
use crate::query;
use crate::scene::channel::{Channel, Channels};
use crate::scene::builder::NodeBuilder;
use crate::scene::geometry::MeshData;
use crate::scene::graph::{DuplicateOptions, SceneGraph};
use crate::scene::node::Node;
use crate::scene::skin::{BindPose, SkinCluster, WeightTable};
use crate::scene::transform::{FreezeChannels, Transform};
use crate::scene::{MeshKey, NodeHandle, NodeKind, PoseKey, SkinKey};
use crate::utils::names;

/// In-memory scene graph
///
/// Scene 是纯数据层：节点层级、组件数据（网格、蒙皮、绑定姿势）。
/// It implements [`SceneGraph`] so the extraction core can run without a
/// host application.
#[derive(Debug, Default)]
pub struct Scene {
    pub(crate) nodes: SlotMap<NodeHandle, Node>,
    pub root_nodes: Vec<NodeHandle>,
    /// Skin clusters and pose snapshots, in creation order
    pub(crate) dependency_nodes: Vec<NodeHandle>,

    // ====组件/资源池====
    pub(crate) meshes: SlotMap<MeshKey, MeshData>,
    pub(crate) skins: SlotMap<SkinKey, SkinCluster>,
    pub(crate) poses: SlotMap<PoseKey, BindPose>,
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 开始构建一个节点
    pub fn build_node(&mut self, name: &str, kind: NodeKind) -> NodeBuilder<'_> {
        NodeBuilder::new(self, name, kind)
    }

    /// Inserts a node, attaching it under `parent` or at the scene root.
    ///
    /// Dependency nodes ignore `parent`.
    pub fn insert_node(&mut self, mut node: Node, parent: Option<NodeHandle>) -> NodeHandle {
        let is_dag = node.kind.is_dag();
        let parent = parent.filter(|p| is_dag && self.nodes.contains_key(*p));
        node.parent = parent;
        let handle = self.nodes.insert(node);

        if !is_dag {
            self.dependency_nodes.push(handle);
        } else if let Some(p) = parent {
            self.nodes[p].children.push(handle);
        } else {
            self.root_nodes.push(handle);
        }
        handle
    }

    /// 获取只读引用
    #[must_use]
    pub fn get_node(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle)
    }

    /// 获取可变引用
    pub fn get_node_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.nodes.get_mut(handle)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// First node with the given short name, in scene order.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<NodeHandle> {
        self.all_nodes()
            .into_iter()
            .find(|&h| self.nodes[h].name == name)
    }

    /// DAG nodes depth-first from the roots, then dependency nodes.
    #[must_use]
    pub fn all_nodes(&self) -> Vec<NodeHandle> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeHandle> = self.root_nodes.iter().rev().copied().collect();
        while let Some(handle) = stack.pop() {
            out.push(handle);
            if let Some(node) = self.nodes.get(handle) {
                stack.extend(node.children.iter().rev());
            }
        }
        out.extend(self.dependency_nodes.iter().copied());
        out
    }

    /// Connects two nodes (idempotent).
    pub fn connect(&mut self, a: NodeHandle, b: NodeHandle) -> Result<()> {
        self.node(b)?;
        self.node_mut(a)?.connect(b);
        self.node_mut(b)?.connect(a);
        Ok(())
    }

    /// Adds a mesh transform + shape. Returns `(transform, shape)`.
    pub fn add_mesh(&mut self, name: &str, data: MeshData, parent: Option<NodeHandle>) -> Result<(NodeHandle, NodeHandle)> {
        let transform = self.create_mesh(name, data, parent)?;
        let shape = self.nodes[transform].children[0];
        Ok((transform, shape))
    }

    /// Adds an extra shape (e.g. an intermediate "Orig" shape) under a transform.
    pub fn add_shape(&mut self, name: &str, data: MeshData, transform: NodeHandle, intermediate: bool) -> Result<NodeHandle> {
        data.validate()?;
        self.expect_transform(transform)?;
        let mut node = Node::new(name, NodeKind::Mesh);
        node.intermediate = intermediate;
        node.mesh = Some(self.meshes.insert(data));
        Ok(self.insert_node(node, Some(transform)))
    }

    /// Adds a skin cluster with explicit weights.
    pub fn add_skin_cluster(&mut self, name: &str, influences: &[NodeHandle], geometry: NodeHandle, weights: WeightTable) -> Result<NodeHandle> {
        let deformer = self.create_skin_cluster(influences, geometry)?;
        self.set_skin_weights(deformer, weights)?;
        self.rename(deformer, name)?;
        Ok(deformer)
    }

    /// Adds a pose snapshot connected to every member joint.
    pub fn add_bind_pose(&mut self, name: &str, members: &[NodeHandle]) -> Result<NodeHandle> {
        for &member in members {
            self.node(member)?;
        }
        let mut node = Node::new(name, NodeKind::DagPose);
        node.pose = Some(self.poses.insert(BindPose {
            members: members.to_vec(),
        }));
        let pose = self.insert_node(node, None);
        for &member in members {
            self.connect(pose, member)?;
        }
        Ok(pose)
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    pub(crate) fn node(&self, handle: NodeHandle) -> Result<&Node> {
        self.nodes.get(handle).ok_or(RigError::NodeNotFound(handle))
    }

    pub(crate) fn node_mut(&mut self, handle: NodeHandle) -> Result<&mut Node> {
        self.nodes.get_mut(handle).ok_or(RigError::NodeNotFound(handle))
    }

    fn path(&self, handle: NodeHandle) -> String {
        query::full_path(&*self, handle).unwrap_or_else(|_| format!("{handle:?}"))
    }

    fn expect_transform(&self, handle: NodeHandle) -> Result<()> {
        let kind = self.node(handle)?.kind;
        if kind.is_transform() {
            Ok(())
        } else {
            Err(RigError::UnexpectedKind {
                node: self.path(handle),
                expected: "transform or joint",
                found: kind,
            })
        }
    }

    fn conflict(&self, handle: NodeHandle, reason: &str) -> RigError {
        RigError::PruneConflict {
            node: self.path(handle),
            reason: reason.to_string(),
        }
    }

    fn name_exists(&self, name: &str) -> bool {
        self.nodes.values().any(|n| n.name == name)
    }

    /// Removes `handle` from its parent's children or from the root list.
    fn detach(&mut self, handle: NodeHandle) {
        let parent = self.nodes.get(handle).and_then(|n| n.parent);
        if let Some(p) = parent {
            if let Some(parent_node) = self.nodes.get_mut(p) {
                parent_node.remove_child(handle);
            }
        } else if let Some(pos) = self.root_nodes.iter().position(|&x| x == handle) {
            self.root_nodes.remove(pos);
        }
        if let Some(node) = self.nodes.get_mut(handle) {
            node.parent = None;
        }
    }

    fn attach(&mut self, handle: NodeHandle, parent: Option<NodeHandle>) {
        match parent {
            Some(p) => self.nodes[p].children.push(handle),
            None => self.root_nodes.push(handle),
        }
        self.nodes[handle].parent = parent;
    }

    /// Removes a single node and its component data. Children must already be gone.
    fn remove_single(&mut self, handle: NodeHandle) {
        // 蒙皮随几何体一起删除
        if self.nodes.get(handle).is_some_and(|n| n.kind.is_shape()) {
            let driven: Vec<NodeHandle> = self.nodes[handle]
                .connections
                .iter()
                .copied()
                .filter(|&c| {
                    self.nodes
                        .get(c)
                        .and_then(|n| n.skin)
                        .and_then(|k| self.skins.get(k))
                        .is_some_and(|s| s.geometry == handle)
                })
                .collect();
            for deformer in driven {
                self.remove_single(deformer);
            }
        }

        let Some(node) = self.nodes.get(handle) else {
            return;
        };
        let peers: Vec<NodeHandle> = node.connections.to_vec();
        let (mesh, skin, pose) = (node.mesh, node.skin, node.pose);
        let is_dag = node.kind.is_dag();

        for peer in peers {
            if let Some(peer_node) = self.nodes.get_mut(peer) {
                peer_node.disconnect(handle);
            }
            // 影响骨骼被删除时，从蒙皮/姿势中移除
            if let Some(key) = self.nodes.get(peer).and_then(|n| n.pose)
                && let Some(pose) = self.poses.get_mut(key)
            {
                pose.members.retain(|&m| m != handle);
            }
            if let Some(key) = self.nodes.get(peer).and_then(|n| n.skin)
                && let Some(skin) = self.skins.get_mut(key)
                && skin.geometry != handle
            {
                let empty = skin.remove_influence(handle);
                if empty > 0 {
                    log::warn!("{empty} vertex(es) lost all weights when an influence of {} was deleted", self.nodes[peer].name);
                }
            }
        }

        if let Some(key) = mesh {
            self.meshes.remove(key);
        }
        if let Some(key) = skin {
            self.skins.remove(key);
        }
        if let Some(key) = pose {
            self.poses.remove(key);
        }

        if is_dag {
            self.detach(handle);
        } else if let Some(pos) = self.dependency_nodes.iter().position(|&x| x == handle) {
            self.dependency_nodes.remove(pos);
        }
        self.nodes.remove(handle);
    }

    /// Copies `handle` (and its subtree) under `parent`.
    fn duplicate_recursive(&mut self, handle: NodeHandle, parent: Option<NodeHandle>, name: Option<String>, options: DuplicateOptions) -> NodeHandle {
        let source = &self.nodes[handle];
        let mut copy = Node::new(name.as_deref().unwrap_or(&source.name), source.kind);
        copy.transform = source.transform.clone();
        copy.channels = source.channels;
        copy.locked = source.locked;
        copy.intermediate = source.intermediate;
        let mesh = source.mesh.and_then(|k| self.meshes.get(k)).cloned();
        let children = source.children.clone();
        let poses: Vec<NodeHandle> = source
            .connections
            .iter()
            .copied()
            .filter(|&c| self.nodes.get(c).is_some_and(|n| n.kind == NodeKind::DagPose))
            .collect();

        if let Some(data) = mesh {
            copy.mesh = Some(self.meshes.insert(data));
        }
        let dup = self.insert_node(copy, parent);

        if options.input_connections {
            for pose in poses {
                if let Some(key) = self.nodes[pose].pose
                    && let Some(bind_pose) = self.poses.get_mut(key)
                {
                    bind_pose.members.push(dup);
                }
                self.nodes[pose].connect(dup);
                self.nodes[dup].connect(pose);
            }
        }

        for child in children {
            self.duplicate_recursive(child, Some(dup), None, options);
        }
        dup
    }

    /// Pushes `bake` down into the children of `handle`.
    fn compensate_children(&mut self, handle: NodeHandle, bake: &Affine3A) {
        let children = self.nodes[handle].children.clone();
        for child in children {
            let node = &self.nodes[child];
            if node.kind.is_shape() {
                if let Some(data) = node.mesh.and_then(|k| self.meshes.get_mut(k)) {
                    data.apply_matrix(bake);
                }
            } else {
                let is_joint = node.kind == NodeKind::Joint;
                let local = *bake * node.transform.local_matrix();
                self.nodes[child].transform.set_local_matrix(local, is_joint);
            }
        }
    }

    /// Nearest influence (by world position) for every vertex of `shape`.
    fn nearest_influence_weights(&self, influences: &[NodeHandle], shape: NodeHandle) -> Result<WeightTable> {
        let data = self.mesh(shape)?;
        let positions = data.transformed_positions(&query::world_matrix(&*self, shape)?);
        let joints = influences
            .iter()
            .map(|&j| query::world_position(&*self, j))
            .collect::<Result<Vec<Vec3>>>()?;

        let mut table = WeightTable::new(positions.len(), influences.len());
        for (vertex, p) in positions.iter().enumerate() {
            let nearest = joints
                .iter()
                .enumerate()
                .min_by(|a, b| p.distance_squared(*a.1).total_cmp(&p.distance_squared(*b.1)))
                .map_or(0, |(i, _)| i);
            table.set(vertex, nearest, 1.0);
        }
        Ok(table)
    }
}

impl SceneGraph for Scene {
    fn contains(&self, node: NodeHandle) -> bool {
        self.nodes.contains_key(node)
    }

    fn kind(&self, node: NodeHandle) -> Result<NodeKind> {
        Ok(self.node(node)?.kind)
    }

    fn name(&self, node: NodeHandle) -> Result<&str> {
        Ok(&self.node(node)?.name)
    }

    fn parent(&self, node: NodeHandle) -> Result<Option<NodeHandle>> {
        Ok(self.node(node)?.parent)
    }

    fn children(&self, node: NodeHandle) -> Result<&[NodeHandle]> {
        Ok(&self.node(node)?.children)
    }

    fn connections(&self, node: NodeHandle) -> Result<&[NodeHandle]> {
        Ok(&self.node(node)?.connections)
    }

    fn transform(&self, node: NodeHandle) -> Result<&Transform> {
        Ok(&self.node(node)?.transform)
    }

    fn channels(&self, node: NodeHandle) -> Result<&Channels> {
        Ok(&self.node(node)?.channels)
    }

    fn nodes_of_kind(&self, kind: NodeKind) -> Vec<NodeHandle> {
        self.all_nodes()
            .into_iter()
            .filter(|&h| self.nodes[h].kind == kind)
            .collect()
    }

    fn mesh(&self, shape: NodeHandle) -> Result<&MeshData> {
        let node = self.node(shape)?;
        node.mesh
            .and_then(|k| self.meshes.get(k))
            .ok_or_else(|| RigError::UnexpectedKind {
                node: self.path(shape),
                expected: "mesh",
                found: node.kind,
            })
    }

    fn skin_cluster(&self, deformer: NodeHandle) -> Result<&SkinCluster> {
        let node = self.node(deformer)?;
        node.skin
            .and_then(|k| self.skins.get(k))
            .ok_or_else(|| RigError::UnexpectedKind {
                node: self.path(deformer),
                expected: "skinCluster",
                found: node.kind,
            })
    }

    fn bind_pose(&self, pose: NodeHandle) -> Result<&BindPose> {
        let node = self.node(pose)?;
        node.pose
            .and_then(|k| self.poses.get(k))
            .ok_or_else(|| RigError::UnexpectedKind {
                node: self.path(pose),
                expected: "dagPose",
                found: node.kind,
            })
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    fn create_group(&mut self, name: &str) -> NodeHandle {
        self.insert_node(Node::new(name, NodeKind::Transform), None)
    }

    fn duplicate(&mut self, node: NodeHandle, options: DuplicateOptions) -> Result<NodeHandle> {
        let kind = self.node(node)?.kind;
        let top = match kind {
            NodeKind::Mesh => self.node(node)?.parent.ok_or_else(|| self.conflict(node, "shape has no transform"))?,
            NodeKind::Transform | NodeKind::Joint => node,
            found => {
                return Err(RigError::UnexpectedKind {
                    node: self.path(node),
                    expected: "DAG node",
                    found,
                });
            }
        };

        let source = &self.nodes[top];
        let parent = source.parent;
        let stem = names::strip_numeric_suffix(&source.name).to_string();
        let name = names::next_free_name(&stem, |candidate| self.name_exists(candidate));

        let dup = self.duplicate_recursive(top, parent, Some(name), options);
        log::debug!("Duplicated {} -> {}", self.path(top), self.path(dup));
        Ok(dup)
    }

    fn reparent(&mut self, node: NodeHandle, parent: Option<NodeHandle>) -> Result<()> {
        let current = self.node(node)?;
        if current.kind.is_shape() {
            return Err(self.conflict(node, "shape nodes cannot be re-parented"));
        }
        if !current.kind.is_dag() {
            return Err(RigError::UnexpectedKind {
                node: self.path(node),
                expected: "DAG node",
                found: current.kind,
            });
        }
        if current.parent == parent {
            return Ok(());
        }
        if current.locked {
            return Err(self.conflict(node, "node is locked"));
        }

        let parent_world = match parent {
            Some(p) => {
                self.expect_transform(p)?;
                if query::is_ancestor_of(&*self, node, p)? {
                    return Err(self.conflict(node, "new parent is a descendant"));
                }
                query::world_matrix(&*self, p)?
            }
            None => Affine3A::IDENTITY,
        };

        let world = query::world_matrix(&*self, node)?;
        let is_joint = current.kind == NodeKind::Joint;

        self.detach(node);
        self.attach(node, parent);
        let local = parent_world.inverse() * world;
        self.nodes[node].transform.set_local_matrix(local, is_joint);
        Ok(())
    }

    fn delete(&mut self, node: NodeHandle) -> Result<()> {
        self.node(node)?;
        let mut subtree = vec![node];
        if self.nodes[node].kind.is_dag() {
            subtree.extend(query::descendants(&*self, node)?);
        }
        if let Some(&locked) = subtree.iter().find(|&&h| self.nodes[h].locked) {
            return Err(self.conflict(locked, "node is locked"));
        }

        // 逆序删除：子节点先于父节点
        for handle in subtree.into_iter().rev() {
            self.remove_single(handle);
        }
        Ok(())
    }

    fn delete_history(&mut self, node: NodeHandle) -> Result<()> {
        let kind = self.node(node)?.kind;
        let shapes = if kind.is_shape() {
            vec![node]
        } else {
            query::shape_of(&*self, node, query::ShapeFilter::ALL)?
        };

        for shape in shapes {
            if self.nodes[shape].intermediate {
                if self.nodes[shape].locked {
                    return Err(self.conflict(shape, "intermediate shape is locked"));
                }
                self.remove_single(shape);
                continue;
            }

            let peers: Vec<NodeHandle> = self.nodes[shape].connections.to_vec();
            for peer in peers {
                let drives_shape = self
                    .nodes
                    .get(peer)
                    .and_then(|n| n.skin)
                    .and_then(|k| self.skins.get(k))
                    .is_some_and(|s| s.geometry == shape);
                if drives_shape {
                    self.remove_single(peer);
                } else {
                    self.nodes[shape].disconnect(peer);
                    if let Some(peer_node) = self.nodes.get_mut(peer) {
                        peer_node.disconnect(shape);
                    }
                }
            }
        }
        Ok(())
    }

    fn freeze_transform(&mut self, node: NodeHandle, channels: FreezeChannels) -> Result<()> {
        self.expect_transform(node)?;
        let current = &self.nodes[node];

        let mut guarded = Channel::empty();
        if channels.contains(FreezeChannels::TRANSLATE) {
            guarded |= Channel::TRANSLATE;
        }
        if channels.contains(FreezeChannels::ROTATE) {
            guarded |= Channel::ROTATE;
        }
        if channels.contains(FreezeChannels::SCALE) {
            guarded |= Channel::SCALE;
        }
        let locked = current.channels.locked_in(guarded);
        if !locked.is_empty() {
            return Err(RigError::LockedChannel {
                node: self.path(node),
                channel: locked,
            });
        }

        let is_joint = current.kind == NodeKind::Joint;
        let mut transform = current.transform.clone();
        let mut remaining = channels;
        if is_joint && channels.contains(FreezeChannels::ROTATE) {
            // 关节旋转烘焙进 joint orient，矩阵不变
            transform.orient_from_rotation();
            remaining.remove(FreezeChannels::ROTATE);
        }

        let full = transform.local_matrix();
        let kept = transform.kept_matrix(remaining);
        let bake = kept.inverse() * full;
        transform.reset(remaining);
        self.nodes[node].transform = transform;

        if !bake.abs_diff_eq(Affine3A::IDENTITY, 1e-6) {
            self.compensate_children(node, &bake);
        }
        Ok(())
    }

    fn restore_channels(&mut self, node: NodeHandle) -> Result<()> {
        self.node_mut(node)?.channels.restore();
        Ok(())
    }

    fn set_channel_lock(&mut self, node: NodeHandle, channel: Channel, locked: bool) -> Result<()> {
        self.node_mut(node)?.channels.locked.set(channel, locked);
        Ok(())
    }

    fn set_node_lock(&mut self, node: NodeHandle, locked: bool) -> Result<()> {
        self.node_mut(node)?.locked = locked;
        Ok(())
    }

    fn set_visibility(&mut self, node: NodeHandle, visible: bool) -> Result<()> {
        let locked = self.node(node)?.channels.locked_in(Channel::VISIBILITY);
        if !locked.is_empty() {
            return Err(RigError::LockedChannel {
                node: self.path(node),
                channel: locked,
            });
        }
        self.node_mut(node)?.channels.visible = visible;
        Ok(())
    }

    fn create_skin_cluster(&mut self, influences: &[NodeHandle], geometry: NodeHandle) -> Result<NodeHandle> {
        let shape = query::result_shape(&*self, geometry)?;
        if influences.is_empty() {
            return Err(RigError::EmptyInfluenceSet(self.path(geometry)));
        }
        for &joint in influences {
            let kind = self.node(joint)?.kind;
            if kind != NodeKind::Joint {
                return Err(RigError::UnexpectedKind {
                    node: self.path(joint),
                    expected: "joint",
                    found: kind,
                });
            }
        }

        let weights = self.nearest_influence_weights(influences, shape)?;
        let name = names::next_free_name("skinCluster", |candidate| self.name_exists(candidate));

        let mut node = Node::new(&name, NodeKind::SkinCluster);
        node.skin = Some(self.skins.insert(SkinCluster {
            influences: influences.to_vec(),
            geometry: shape,
            weights,
        }));
        let deformer = self.insert_node(node, None);

        self.connect(deformer, shape)?;
        for &joint in influences {
            self.connect(deformer, joint)?;
        }
        log::debug!("Bound {} to {} influences via {name}", self.path(shape), influences.len());
        Ok(deformer)
    }

    fn set_skin_weights(&mut self, deformer: NodeHandle, weights: WeightTable) -> Result<()> {
        let skin = self.skin_cluster(deformer)?;
        let vertex_count = self.mesh(skin.geometry)?.vertex_count();
        if weights.influence_count() != skin.influences.len() || weights.vertex_count() != vertex_count {
            return Err(RigError::InvalidGeometry(format!(
                "weight table is {}x{}, skin cluster expects {}x{}",
                weights.vertex_count(),
                weights.influence_count(),
                vertex_count,
                skin.influences.len()
            )));
        }

        if let Some(key) = self.nodes[deformer].skin
            && let Some(skin) = self.skins.get_mut(key)
        {
            skin.weights = weights;
        }
        Ok(())
    }

    fn create_mesh(&mut self, name: &str, data: MeshData, parent: Option<NodeHandle>) -> Result<NodeHandle> {
        if name.is_empty() {
            return Err(RigError::InvalidName(name.to_string()));
        }
        data.validate()?;
        if let Some(p) = parent {
            self.expect_transform(p)?;
        }

        let transform = self.insert_node(Node::new(name, NodeKind::Transform), parent);
        let mut shape = Node::new(&format!("{name}Shape"), NodeKind::Mesh);
        shape.mesh = Some(self.meshes.insert(data));
        self.insert_node(shape, Some(transform));
        Ok(transform)
    }

    fn rename(&mut self, node: NodeHandle, name: &str) -> Result<()> {
        if name.is_empty() || name.contains('|') {
            return Err(RigError::InvalidName(name.to_string()));
        }
        self.node_mut(node)?.name = name.to_string();
        Ok(())
    }
}
