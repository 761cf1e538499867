//! Scene Integration Tests
//!
//! Tests for:
//! - Scene: node creation, world-preserving re-parent, subtree delete
//! - Duplicate: naming, pose membership, component copies
//! - Freeze transform on meshes and joints
//! - Construction history and skin cluster creation
//! - Channel locks and visibility

use std::f32::consts::FRAC_PI_2;

use glam::Vec3;
use rigkit::RigError;
use rigkit::query;
use rigkit::scene::{
    Channel, DuplicateOptions, FreezeChannels, MeshData, NodeKind, Scene, SceneGraph, WeightTable,
};
use smallvec::smallvec;

const EPSILON: f32 = 1e-4;

fn approx_eq_vec3(a: Vec3, b: Vec3) -> bool {
    (a - b).abs().max_element() < EPSILON
}

fn quad(x: f32, top: f32, bottom: f32) -> MeshData {
    MeshData::new(
        vec![
            Vec3::new(x, top, 0.0),
            Vec3::new(x + 1.0, top, 0.0),
            Vec3::new(x + 1.0, bottom, 0.0),
            Vec3::new(x, bottom, 0.0),
        ],
        vec![smallvec![0, 1, 2, 3]],
    )
    .unwrap()
}

fn world_vertices(scene: &Scene, shape: rigkit::NodeHandle) -> Vec<Vec3> {
    let matrix = query::world_matrix(scene, shape).unwrap();
    scene.mesh(shape).unwrap().transformed_positions(&matrix)
}

// ============================================================================
// Node Creation
// ============================================================================

#[test]
fn scene_build_node_hierarchy() {
    let mut scene = Scene::new();
    let hip = scene.build_node("hip", NodeKind::Joint).build();
    let knee = scene
        .build_node("knee", NodeKind::Joint)
        .with_parent(hip)
        .with_translation(0.0, -4.0, 0.0)
        .build();

    assert!(scene.root_nodes.contains(&hip));
    assert!(!scene.root_nodes.contains(&knee));
    assert_eq!(scene.parent(knee).unwrap(), Some(hip));
    assert_eq!(scene.children(hip).unwrap(), &[knee]);
    assert_eq!(scene.name(knee).unwrap(), "knee");
}

#[test]
fn scene_create_mesh_adds_shape() {
    let mut scene = Scene::new();
    let leg = scene.create_mesh("leg", quad(0.0, 1.0, 0.0), None).unwrap();

    let shapes = query::shape_of(&scene, leg, query::ShapeFilter::ALL).unwrap();
    assert_eq!(shapes.len(), 1);
    assert_eq!(scene.name(shapes[0]).unwrap(), "legShape");
    assert_eq!(scene.kind(shapes[0]).unwrap(), NodeKind::Mesh);
    assert_eq!(scene.mesh(shapes[0]).unwrap().vertex_count(), 4);
}

#[test]
fn scene_dependency_nodes_are_not_roots() {
    let mut scene = Scene::new();
    let hip = scene.build_node("hip", NodeKind::Joint).build();
    let pose = scene.add_bind_pose("bindPose1", &[hip]).unwrap();

    assert!(!scene.root_nodes.contains(&pose));
    assert_eq!(scene.parent(pose).unwrap(), None);
    assert_eq!(scene.nodes_of_kind(NodeKind::DagPose), vec![pose]);
    assert_eq!(scene.connections(hip).unwrap(), &[pose]);
}

#[test]
fn scene_rename_rejects_path_separator() {
    let mut scene = Scene::new();
    let node = scene.create_group("grp");

    assert!(matches!(scene.rename(node, "a|b"), Err(RigError::InvalidName(_))));
    scene.rename(node, "grp2").unwrap();
    assert_eq!(scene.name(node).unwrap(), "grp2");
}

// ============================================================================
// Re-parent & Delete
// ============================================================================

#[test]
fn scene_reparent_preserves_world_position() {
    let mut scene = Scene::new();
    let a = scene
        .build_node("a", NodeKind::Transform)
        .with_translation(5.0, 0.0, 0.0)
        .with_rotation(0.0, FRAC_PI_2, 0.0)
        .build();
    let b = scene
        .build_node("b", NodeKind::Transform)
        .with_translation(1.0, 2.0, 3.0)
        .build();
    let before = query::world_position(&scene, b).unwrap();

    scene.reparent(b, Some(a)).unwrap();

    assert_eq!(scene.parent(b).unwrap(), Some(a));
    assert!(!scene.root_nodes.contains(&b));
    assert!(approx_eq_vec3(query::world_position(&scene, b).unwrap(), before));
}

#[test]
fn scene_reparent_to_world() {
    let mut scene = Scene::new();
    let a = scene.build_node("a", NodeKind::Transform).with_translation(0.0, 3.0, 0.0).build();
    let b = scene
        .build_node("b", NodeKind::Joint)
        .with_parent(a)
        .with_translation(0.0, 1.0, 0.0)
        .build();

    scene.reparent(b, None).unwrap();

    assert!(scene.root_nodes.contains(&b));
    assert!(approx_eq_vec3(scene.transform(b).unwrap().translation, Vec3::new(0.0, 4.0, 0.0)));
}

#[test]
fn scene_reparent_shape_is_refused() {
    let mut scene = Scene::new();
    let (_, shape) = scene.add_mesh("leg", quad(0.0, 1.0, 0.0), None).unwrap();
    let other = scene.create_group("other");

    let result = scene.reparent(shape, Some(other));
    assert!(matches!(result, Err(RigError::PruneConflict { .. })));
}

#[test]
fn scene_reparent_under_descendant_is_refused() {
    let mut scene = Scene::new();
    let a = scene.build_node("a", NodeKind::Transform).build();
    let b = scene.build_node("b", NodeKind::Transform).with_parent(a).build();

    assert!(scene.reparent(a, Some(b)).unwrap_err().is_prune_conflict());
}

#[test]
fn scene_delete_removes_subtree() {
    let mut scene = Scene::new();
    let a = scene.build_node("a", NodeKind::Transform).build();
    let b = scene.build_node("b", NodeKind::Joint).with_parent(a).build();
    let (leg, shape) = scene.add_mesh("leg", quad(0.0, 1.0, 0.0), Some(b)).unwrap();

    scene.delete(a).unwrap();

    for node in [a, b, leg, shape] {
        assert!(!scene.contains(node));
    }
    assert!(scene.root_nodes.is_empty());
    assert!(matches!(scene.kind(b), Err(RigError::NodeNotFound(_))));
}

#[test]
fn scene_delete_locked_node_is_refused() {
    let mut scene = Scene::new();
    let a = scene.build_node("a", NodeKind::Transform).build();
    let b = scene.build_node("b", NodeKind::Transform).with_parent(a).locked().build();

    let err = scene.delete(a).unwrap_err();

    assert!(err.is_prune_conflict());
    assert!(scene.contains(a));
    assert!(scene.contains(b));
}

#[test]
fn scene_delete_shape_removes_its_skin_cluster() {
    let mut scene = Scene::new();
    let hip = scene.build_node("hip", NodeKind::Joint).build();
    let (_, shape) = scene.add_mesh("leg", quad(0.0, 1.0, 0.0), None).unwrap();
    let skin = scene.create_skin_cluster(&[hip], shape).unwrap();

    scene.delete(shape).unwrap();

    assert!(!scene.contains(skin));
    assert!(scene.connections(hip).unwrap().is_empty());
}

// ============================================================================
// Duplicate
// ============================================================================

#[test]
fn scene_duplicate_names_top_node_only() {
    let mut scene = Scene::new();
    let hip = scene.build_node("hip", NodeKind::Joint).build();
    scene.build_node("knee", NodeKind::Joint).with_parent(hip).build();

    let first = scene.duplicate(hip, DuplicateOptions::default()).unwrap();
    let second = scene.duplicate(hip, DuplicateOptions::default()).unwrap();

    assert_eq!(scene.name(first).unwrap(), "hip1");
    assert_eq!(scene.name(second).unwrap(), "hip2");
    let child = scene.children(first).unwrap()[0];
    assert_eq!(scene.name(child).unwrap(), "knee");
    assert!(scene.root_nodes.contains(&first));
}

#[test]
fn scene_duplicate_shape_copies_transform_without_skin() {
    let mut scene = Scene::new();
    let hip = scene.build_node("hip", NodeKind::Joint).build();
    let parent = scene.create_group("geo");
    let (leg, shape) = scene.add_mesh("leg", quad(0.0, 1.0, 0.0), Some(parent)).unwrap();
    scene.create_skin_cluster(&[hip], shape).unwrap();

    let dup = scene.duplicate(shape, DuplicateOptions::default()).unwrap();

    assert_ne!(dup, leg);
    assert_eq!(scene.parent(dup).unwrap(), Some(parent));
    let dup_shape = query::result_shape(&scene, dup).unwrap();
    assert_eq!(scene.mesh(dup_shape).unwrap(), scene.mesh(shape).unwrap());
    assert!(query::skin_of(&scene, dup_shape).unwrap().is_none());
}

#[test]
fn scene_duplicate_input_connections_keeps_pose_membership() {
    let mut scene = Scene::new();
    let hip = scene.build_node("hip", NodeKind::Joint).build();
    let pose = scene.add_bind_pose("bindPose1", &[hip]).unwrap();

    let plain = scene.duplicate(hip, DuplicateOptions::default()).unwrap();
    let linked = scene.duplicate(hip, DuplicateOptions { input_connections: true }).unwrap();

    assert!(scene.connections(plain).unwrap().is_empty());
    assert_eq!(scene.connections(linked).unwrap(), &[pose]);
    assert!(scene.bind_pose(pose).unwrap().members.contains(&linked));
}

// ============================================================================
// Freeze Transform
// ============================================================================

#[test]
fn scene_freeze_mesh_keeps_world_vertices() {
    let mut scene = Scene::new();
    let (leg, shape) = scene.add_mesh("leg", quad(0.0, 1.0, 0.0), None).unwrap();
    {
        let node = scene.get_node_mut(leg).unwrap();
        node.transform.translation = Vec3::new(1.0, 2.0, 3.0);
        node.transform.rotation = Vec3::new(0.0, FRAC_PI_2, 0.0);
        node.transform.scale = Vec3::splat(2.0);
    }
    let before = world_vertices(&scene, shape);

    scene.freeze_transform(leg, FreezeChannels::all()).unwrap();

    let transform = scene.transform(leg).unwrap();
    assert_eq!(transform.translation, Vec3::ZERO);
    assert_eq!(transform.rotation, Vec3::ZERO);
    assert_eq!(transform.scale, Vec3::ONE);
    for (a, b) in before.iter().zip(world_vertices(&scene, shape)) {
        assert!(approx_eq_vec3(*a, b));
    }
}

#[test]
fn scene_freeze_joint_rotation_moves_into_orient() {
    let mut scene = Scene::new();
    let hip = scene
        .build_node("hip", NodeKind::Joint)
        .with_translation(0.0, 10.0, 0.0)
        .with_rotation(0.0, 0.0, 0.5)
        .build();
    let knee = scene
        .build_node("knee", NodeKind::Joint)
        .with_parent(hip)
        .with_translation(0.0, -4.0, 0.0)
        .build();
    let knee_world = query::world_position(&scene, knee).unwrap();

    scene.freeze_transform(hip, FreezeChannels::ROTATE | FreezeChannels::SCALE).unwrap();

    let transform = scene.transform(hip).unwrap();
    assert_eq!(transform.rotation, Vec3::ZERO);
    assert!(approx_eq_vec3(transform.translation, Vec3::new(0.0, 10.0, 0.0)));
    // The child was not touched
    assert!(approx_eq_vec3(scene.transform(knee).unwrap().translation, Vec3::new(0.0, -4.0, 0.0)));
    assert!(approx_eq_vec3(query::world_position(&scene, knee).unwrap(), knee_world));
}

#[test]
fn scene_freeze_joint_scale_compensates_children() {
    let mut scene = Scene::new();
    let hip = scene.build_node("hip", NodeKind::Joint).with_scale(2.0).build();
    let knee = scene
        .build_node("knee", NodeKind::Joint)
        .with_parent(hip)
        .with_translation(0.0, -4.0, 0.0)
        .build();

    scene.freeze_transform(hip, FreezeChannels::SCALE).unwrap();

    assert_eq!(scene.transform(hip).unwrap().scale, Vec3::ONE);
    assert!(approx_eq_vec3(query::world_position(&scene, knee).unwrap(), Vec3::new(0.0, -8.0, 0.0)));
}

#[test]
fn scene_freeze_locked_channel_fails() {
    let mut scene = Scene::new();
    let node = scene
        .build_node("ctrl", NodeKind::Transform)
        .with_locked_channels(Channel::RX)
        .build();

    let result = scene.freeze_transform(node, FreezeChannels::ROTATE);
    assert!(matches!(result, Err(RigError::LockedChannel { .. })));

    scene.restore_channels(node).unwrap();
    assert!(scene.freeze_transform(node, FreezeChannels::ROTATE).is_ok());
}

// ============================================================================
// History & Skinning
// ============================================================================

#[test]
fn scene_delete_history_removes_orig_and_skin() {
    let mut scene = Scene::new();
    let hip = scene.build_node("hip", NodeKind::Joint).build();
    let (leg, shape) = scene.add_mesh("leg", quad(0.0, 1.0, 0.0), None).unwrap();
    let orig = scene.add_shape("legShapeOrig", quad(0.0, 1.0, 0.0), leg, true).unwrap();
    let skin = scene.create_skin_cluster(&[hip], shape).unwrap();

    scene.delete_history(leg).unwrap();

    assert!(!scene.contains(orig));
    assert!(!scene.contains(skin));
    assert!(scene.contains(shape));
    assert_eq!(scene.children(leg).unwrap(), &[shape]);
}

#[test]
fn scene_create_skin_cluster_binds_nearest_joint() {
    let mut scene = Scene::new();
    let top = scene.build_node("top", NodeKind::Joint).with_translation(0.0, 1.0, 0.0).build();
    let bottom = scene.build_node("bottom", NodeKind::Joint).build();
    let (leg, _) = scene.add_mesh("leg", quad(0.0, 1.0, 0.0), None).unwrap();

    let skin = scene.create_skin_cluster(&[top, bottom], leg).unwrap();

    let cluster = scene.skin_cluster(skin).unwrap();
    assert_eq!(scene.name(skin).unwrap(), "skinCluster1");
    assert_eq!(cluster.influences, vec![top, bottom]);
    assert!(cluster.weights.is_normalized(EPSILON));
    assert_eq!(cluster.weights.row(0), &[1.0, 0.0]);
    assert_eq!(cluster.weights.row(3), &[0.0, 1.0]);
}

#[test]
fn scene_delete_influence_drops_weight_column() {
    let mut scene = Scene::new();
    let top = scene.build_node("top", NodeKind::Joint).with_translation(0.0, 1.0, 0.0).build();
    let bottom = scene.build_node("bottom", NodeKind::Joint).build();
    let (leg, shape) = scene.add_mesh("leg", quad(0.0, 1.0, 0.0), None).unwrap();
    let skin = scene.create_skin_cluster(&[top, bottom], leg).unwrap();
    let weights = WeightTable::from_rows(
        &[vec![0.25, 0.75], vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]],
        2,
    )
    .unwrap();
    scene.set_skin_weights(skin, weights).unwrap();

    scene.delete(bottom).unwrap();

    assert!(scene.contains(skin));
    assert_eq!(query::influences_of(&scene, skin).unwrap(), vec![top]);
    assert_eq!(query::joints_of_skin(&scene, leg).unwrap(), vec![top]);
    assert_eq!(query::skin_of(&scene, shape).unwrap(), Some(skin));

    let cluster = scene.skin_cluster(skin).unwrap();
    assert_eq!(cluster.weights.influence_count(), 1);
    assert_eq!(cluster.weights.vertex_count(), 4);
    assert!((cluster.weights.get(0, 0) - 1.0).abs() < EPSILON);
    assert!((cluster.weights.get(3, 0) - 1.0).abs() < EPSILON);
    // Vertex 2 was bound to the deleted joint only
    assert_eq!(cluster.weights.row(2), &[0.0]);
}

#[test]
fn scene_create_skin_cluster_requires_influences() {
    let mut scene = Scene::new();
    let (leg, _) = scene.add_mesh("leg", quad(0.0, 1.0, 0.0), None).unwrap();
    let ctrl = scene.build_node("ctrl", NodeKind::Transform).build();

    assert!(matches!(
        scene.create_skin_cluster(&[], leg),
        Err(RigError::EmptyInfluenceSet(_))
    ));
    assert!(matches!(
        scene.create_skin_cluster(&[ctrl], leg),
        Err(RigError::UnexpectedKind { .. })
    ));
}

#[test]
fn scene_set_skin_weights_checks_dimensions() {
    let mut scene = Scene::new();
    let hip = scene.build_node("hip", NodeKind::Joint).build();
    let (leg, _) = scene.add_mesh("leg", quad(0.0, 1.0, 0.0), None).unwrap();
    let skin = scene.create_skin_cluster(&[hip], leg).unwrap();

    let result = scene.set_skin_weights(skin, WeightTable::new(3, 1));
    assert!(matches!(result, Err(RigError::InvalidGeometry(_))));
}

// ============================================================================
// Channels
// ============================================================================

#[test]
fn scene_visibility_respects_lock() {
    let mut scene = Scene::new();
    let hip = scene
        .build_node("hip", NodeKind::Joint)
        .with_locked_channels(Channel::VISIBILITY)
        .hidden()
        .build();

    assert!(matches!(
        scene.set_visibility(hip, true),
        Err(RigError::LockedChannel { .. })
    ));

    scene.set_channel_lock(hip, Channel::VISIBILITY, false).unwrap();
    scene.set_visibility(hip, true).unwrap();
    assert!(scene.channels(hip).unwrap().visible);
}

#[test]
fn scene_restore_channels_resets_state() {
    let mut scene = Scene::new();
    let node = scene
        .build_node("ctrl", NodeKind::Transform)
        .with_locked_channels(Channel::TRANSLATE | Channel::VISIBILITY)
        .hidden()
        .build();
    assert!(!scene.channels(node).unwrap().is_default());

    scene.restore_channels(node).unwrap();

    assert!(scene.channels(node).unwrap().is_default());
}
