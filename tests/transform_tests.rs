//! Transform & Hierarchy Propagation Tests
//!
//! Tests for:
//! - Local TRS to local matrix conversion and shadow-state dirty checking
//! - World matrix = product of local matrices along the ancestor chain
//! - Propagation idempotency (no changes => no nodes reported moved)
//! - Parent motion cascading to descendants
//! - Reparent with and without world-pose preservation
//! - apply_local_matrix decomposition round-trip

use std::f32::consts::FRAC_PI_2;

use glam::{Affine3A, Quat, Vec3};

use fable::{Scene, Transform};

const EPSILON: f32 = 1e-4;

fn approx_vec3(a: Vec3, b: Vec3) -> bool {
    (a - b).length() < EPSILON
}

// ============================================================================
// Local matrix & dirty checking
// ============================================================================

#[test]
fn fresh_transform_is_dirty() {
    let t = Transform::new();
    assert!(t.is_dirty());
}

#[test]
fn update_local_matrix_consumes_dirty_flag() {
    let mut t = Transform::from_position(1.0, 2.0, 3.0);
    assert!(t.update_local_matrix());
    assert!(!t.is_dirty());
    // No change since last update
    assert!(!t.update_local_matrix());
}

#[test]
fn mutating_position_redirties() {
    let mut t = Transform::new();
    t.update_local_matrix();
    t.position = Vec3::new(0.0, 5.0, 0.0);
    assert!(t.is_dirty());
    assert!(t.update_local_matrix());
}

#[test]
fn apply_local_matrix_round_trips_trs() {
    let original = Affine3A::from_scale_rotation_translation(
        Vec3::new(2.0, 2.0, 2.0),
        Quat::from_rotation_y(FRAC_PI_2),
        Vec3::new(1.0, -3.0, 7.0),
    );

    let mut t = Transform::new();
    t.apply_local_matrix(original);

    assert!(approx_vec3(t.position, Vec3::new(1.0, -3.0, 7.0)));
    assert!(approx_vec3(t.scale, Vec3::splat(2.0)));
    let recomposed =
        Affine3A::from_scale_rotation_translation(t.scale, t.rotation, t.position);
    for (a, b) in original
        .to_cols_array()
        .iter()
        .zip(recomposed.to_cols_array().iter())
    {
        assert!((a - b).abs() < EPSILON);
    }
}

// ============================================================================
// Hierarchy propagation
// ============================================================================

#[test]
fn child_world_position_composes_parent() {
    let mut scene = Scene::new();
    let parent = scene
        .build_node("parent")
        .with_position(5.0, 0.0, 0.0)
        .build()
        .unwrap();
    let child = scene
        .build_node("child")
        .with_parent(parent)
        .with_position(1.0, 0.0, 0.0)
        .build()
        .unwrap();

    let mut moved = Vec::new();
    scene.update_matrix_world(&mut moved);

    let world = scene.get_node(child).unwrap().transform.world_position();
    assert!(approx_vec3(world, Vec3::new(6.0, 0.0, 0.0)));
}

#[test]
fn three_level_chain_matches_manual_product() {
    let mut scene = Scene::new();
    let a = scene
        .build_node("a")
        .with_position(1.0, 0.0, 0.0)
        .with_rotation(Quat::from_rotation_z(FRAC_PI_2))
        .build()
        .unwrap();
    let b = scene
        .build_node("b")
        .with_parent(a)
        .with_position(0.0, 2.0, 0.0)
        .with_scale(2.0)
        .build()
        .unwrap();
    let c = scene
        .build_node("c")
        .with_parent(b)
        .with_position(0.0, 0.0, 3.0)
        .build()
        .unwrap();

    let mut moved = Vec::new();
    scene.update_matrix_world(&mut moved);

    let expected = *scene.get_node(a).unwrap().transform.local_matrix()
        * *scene.get_node(b).unwrap().transform.local_matrix()
        * *scene.get_node(c).unwrap().transform.local_matrix();
    let actual = *scene.get_node(c).unwrap().world_matrix();

    for (x, y) in expected
        .to_cols_array()
        .iter()
        .zip(actual.to_cols_array().iter())
    {
        assert!((x - y).abs() < EPSILON, "expected {x}, got {y}");
    }
}

#[test]
fn propagation_is_idempotent() {
    let mut scene = Scene::new();
    let parent = scene
        .build_node("parent")
        .with_position(1.0, 2.0, 3.0)
        .build()
        .unwrap();
    scene
        .build_node("child")
        .with_parent(parent)
        .with_position(4.0, 5.0, 6.0)
        .build()
        .unwrap();

    let mut moved = Vec::new();
    scene.update_matrix_world(&mut moved);
    assert_eq!(moved.len(), 2);

    moved.clear();
    scene.update_matrix_world(&mut moved);
    assert!(moved.is_empty(), "second pass must not report motion");
}

#[test]
fn parent_motion_cascades_to_descendants() {
    let mut scene = Scene::new();
    let parent = scene.build_node("parent").build().unwrap();
    let child = scene
        .build_node("child")
        .with_parent(parent)
        .with_position(0.0, 1.0, 0.0)
        .build()
        .unwrap();
    let grandchild = scene
        .build_node("grandchild")
        .with_parent(child)
        .with_position(0.0, 1.0, 0.0)
        .build()
        .unwrap();

    let mut moved = Vec::new();
    scene.update_matrix_world(&mut moved);
    moved.clear();

    // Move only the root; the whole subtree must follow
    scene.get_node_mut(parent).unwrap().transform.position = Vec3::new(10.0, 0.0, 0.0);
    scene.update_matrix_world(&mut moved);

    assert_eq!(moved.len(), 3);
    let world = scene
        .get_node(grandchild)
        .unwrap()
        .transform
        .world_position();
    assert!(approx_vec3(world, Vec3::new(10.0, 2.0, 0.0)));
}

#[test]
fn untouched_sibling_is_not_reported_moved() {
    let mut scene = Scene::new();
    let a = scene.build_node("a").build().unwrap();
    let b = scene.build_node("b").build().unwrap();

    let mut moved = Vec::new();
    scene.update_matrix_world(&mut moved);
    moved.clear();

    scene.get_node_mut(a).unwrap().transform.position = Vec3::X;
    scene.update_matrix_world(&mut moved);

    assert_eq!(moved, vec![a]);
    assert!(!moved.contains(&b));
}

// ============================================================================
// Reparenting
// ============================================================================

#[test]
fn reparent_keep_world_preserves_world_pose() {
    let mut scene = Scene::new();
    let old_parent = scene
        .build_node("old")
        .with_position(5.0, 0.0, 0.0)
        .build()
        .unwrap();
    let new_parent = scene
        .build_node("new")
        .with_position(0.0, 0.0, 9.0)
        .with_rotation(Quat::from_rotation_y(FRAC_PI_2))
        .build()
        .unwrap();
    let child = scene
        .build_node("child")
        .with_parent(old_parent)
        .with_position(1.0, 2.0, 0.0)
        .build()
        .unwrap();

    let mut moved = Vec::new();
    scene.update_matrix_world(&mut moved);
    let before = scene.get_node(child).unwrap().transform.world_position();

    scene.reparent(child, Some(new_parent), true).unwrap();
    moved.clear();
    scene.update_matrix_world(&mut moved);

    let after = scene.get_node(child).unwrap().transform.world_position();
    assert!(
        approx_vec3(before, after),
        "world pose changed: {before:?} -> {after:?}"
    );
    assert_eq!(scene.get_node(child).unwrap().parent(), Some(new_parent));
}

#[test]
fn reparent_without_keep_world_reinterprets_local() {
    let mut scene = Scene::new();
    let parent = scene
        .build_node("parent")
        .with_position(3.0, 0.0, 0.0)
        .build()
        .unwrap();
    let orphan = scene
        .build_node("orphan")
        .with_position(1.0, 0.0, 0.0)
        .build()
        .unwrap();

    let mut moved = Vec::new();
    scene.update_matrix_world(&mut moved);

    scene.reparent(orphan, Some(parent), false).unwrap();
    moved.clear();
    scene.update_matrix_world(&mut moved);

    // Local (1,0,0) now lives under the parent: world pose jumps to (4,0,0)
    let world = scene.get_node(orphan).unwrap().transform.world_position();
    assert!(approx_vec3(world, Vec3::new(4.0, 0.0, 0.0)));
}

#[test]
fn reparent_to_none_keep_world_promotes_to_root() {
    let mut scene = Scene::new();
    let parent = scene
        .build_node("parent")
        .with_position(0.0, 7.0, 0.0)
        .build()
        .unwrap();
    let child = scene
        .build_node("child")
        .with_parent(parent)
        .with_position(1.0, 0.0, 0.0)
        .build()
        .unwrap();

    let mut moved = Vec::new();
    scene.update_matrix_world(&mut moved);

    scene.reparent(child, None, true).unwrap();
    moved.clear();
    scene.update_matrix_world(&mut moved);

    let world = scene.get_node(child).unwrap().transform.world_position();
    assert!(approx_vec3(world, Vec3::new(1.0, 7.0, 0.0)));
    assert!(scene.root_nodes.contains(&child));
}

#[test]
fn look_at_own_position_keeps_rotation_finite() {
    let mut t = Transform::from_position(2.0, 3.0, 4.0);
    let before = Quat::from_rotation_y(1.0);
    t.rotation = before;

    // No direction to look in; the rotation must stay untouched (and not NaN)
    t.look_at(Vec3::new(2.0, 3.0, 4.0), Vec3::Y);
    assert_eq!(t.rotation, before);
    assert!(t.rotation.is_finite());
}

#[test]
fn look_at_points_forward_axis_at_target() {
    let mut t = Transform::from_position(0.0, 0.0, 0.0);
    t.look_at(Vec3::new(0.0, 0.0, -10.0), Vec3::Y);
    // -Z forward convention: looking down -Z is the identity rotation
    assert!((t.rotation.dot(Quat::IDENTITY).abs() - 1.0).abs() < EPSILON);
}
