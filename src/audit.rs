//! Rig audit helpers
//!
//! Checks and fix-ups an artist runs on the source rig around an extraction.

use crate::errors::Result;
use crate::query;
use crate::scene::{Channel, NodeHandle, NodeKind, SceneGraph};

/// Rotate channel values below this (radians) count as zero.
pub const ROTATION_EPSILON: f32 = 1e-6;

/// Joints under `root` (inclusive) whose rotate channels are not zero.
///
/// Freezing such joints moves their rotation into the joint orient, which
/// changes how animation curves authored on the rotate channels apply.
/// Every hit is logged at warning level.
pub fn joints_with_rotation<G: SceneGraph + ?Sized>(graph: &G, root: NodeHandle) -> Result<Vec<NodeHandle>> {
    let mut out = Vec::new();
    for joint in query::subtree_of_type(graph, root, NodeKind::Joint)? {
        let transform = graph.transform(joint)?;
        if transform.has_rotation(ROTATION_EPSILON) {
            let r = transform.rotation;
            log::warn!(
                "Non-zero rotation on joint {}: ({:.3}, {:.3}, {:.3})",
                query::full_path(graph, joint)?,
                r.x.to_degrees(),
                r.y.to_degrees(),
                r.z.to_degrees()
            );
            out.push(joint);
        }
    }
    Ok(out)
}

/// Unlocks and shows the visibility channel of every joint under `roots`.
///
/// Returns how many joints were touched.
pub fn enable_joint_visibility<G: SceneGraph + ?Sized>(graph: &mut G, roots: &[NodeHandle]) -> Result<usize> {
    let mut count = 0;
    for &root in roots {
        for joint in query::subtree_of_type(&*graph, root, NodeKind::Joint)? {
            graph.set_channel_lock(joint, Channel::VISIBILITY, false)?;
            graph.set_visibility(joint, true)?;
            count += 1;
        }
    }
    Ok(count)
}
