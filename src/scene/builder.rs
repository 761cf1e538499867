use glam::{Quat, Vec3};

use crate::scene::channel::Channel;
use crate::scene::node::Node;
use crate::scene::scene::Scene;
use crate::scene::{NodeHandle, NodeKind};

/// Chainable node construction, mostly used to set up fixture scenes.
///
/// ```rust,ignore
/// let hip = scene.build_node("hip", NodeKind::Joint).build();
/// let knee = scene
///     .build_node("knee", NodeKind::Joint)
///     .with_parent(hip)
///     .with_translation(0.0, -4.0, 0.0)
///     .build();
/// ```
pub struct NodeBuilder<'a> {
    scene: &'a mut Scene,
    node: Node,               // 暂存正在构建的 Node 数据
    parent: Option<NodeHandle>, // 暂存父节点 ID
}

impl<'a> NodeBuilder<'a> {
    pub fn new(scene: &'a mut Scene, name: &str, kind: NodeKind) -> Self {
        Self {
            scene,
            node: Node::new(name, kind),
            parent: None,
        }
    }

    // === 链式配置方法 ===

    /// 设置父节点
    #[must_use]
    pub fn with_parent(mut self, parent: NodeHandle) -> Self {
        self.parent = Some(parent);
        self
    }

    #[must_use]
    pub fn with_translation(mut self, x: f32, y: f32, z: f32) -> Self {
        self.node.transform.translation = Vec3::new(x, y, z);
        self
    }

    /// Rotate channels in radians.
    #[must_use]
    pub fn with_rotation(mut self, x: f32, y: f32, z: f32) -> Self {
        self.node.transform.rotation = Vec3::new(x, y, z);
        self
    }

    #[must_use]
    pub fn with_scale(mut self, s: f32) -> Self {
        self.node.transform.scale = Vec3::splat(s);
        self
    }

    #[must_use]
    pub fn with_joint_orient(mut self, orient: Quat) -> Self {
        self.node.transform.joint_orient = orient;
        self
    }

    /// Locks channels in the channel box.
    #[must_use]
    pub fn with_locked_channels(mut self, channels: Channel) -> Self {
        self.node.channels.locked |= channels;
        self.node.channels.keyable.remove(channels);
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.node.channels.visible = false;
        self
    }

    /// Node lock: the scene refuses to delete or re-parent it.
    #[must_use]
    pub fn locked(mut self) -> Self {
        self.node.locked = true;
        self
    }

    // === 终结方法 ===

    /// 完成构建，将 Node 插入 Scene，返回 Handle
    pub fn build(self) -> NodeHandle {
        self.scene.insert_node(self.node, self.parent)
    }
}
