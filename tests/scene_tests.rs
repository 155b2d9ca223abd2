//! Scene Graph Structure Tests
//!
//! Tests for:
//! - Node insertion, parenting and the NodeBuilder
//! - Structural rejections (invalid parent, cycles, stale handles)
//! - Recursive subtree removal and component-pool cleanup
//! - Generational handle semantics after slot reuse
//! - Active camera management and world-bounds derivation

use glam::{Quat, Vec3};

use fable::{
    BoundingBox, Camera, Collider, ColliderShape, FableError, Light, MeshRenderer, Scene,
};

fn unit_bounds() -> BoundingBox {
    BoundingBox::from_center_half_extents(Vec3::ZERO, Vec3::splat(0.5))
}

// ============================================================================
// Insertion & structural rejection
// ============================================================================

#[test]
fn add_node_under_missing_parent_is_rejected() {
    let mut scene = Scene::new();
    let doomed = scene.build_node("doomed").build().unwrap();
    scene.remove_node(doomed).unwrap();

    let err = scene.build_node("orphan").with_parent(doomed).build();
    assert!(matches!(err, Err(FableError::InvalidParent(_))));
    // Scene is unchanged by the failed insert
    assert_eq!(scene.node_count(), 0);
}

#[test]
fn reparent_under_own_descendant_is_rejected() {
    let mut scene = Scene::new();
    let a = scene.build_node("a").build().unwrap();
    let b = scene.build_node("b").with_parent(a).build().unwrap();
    let c = scene.build_node("c").with_parent(b).build().unwrap();

    let err = scene.reparent(a, Some(c), false);
    assert!(matches!(err, Err(FableError::CycleDetected { .. })));
    // Structure is untouched after the rejection
    assert_eq!(scene.get_node(a).unwrap().parent(), None);
    assert_eq!(scene.get_node(c).unwrap().parent(), Some(b));
}

#[test]
fn reparent_under_self_is_rejected() {
    let mut scene = Scene::new();
    let a = scene.build_node("a").build().unwrap();
    assert!(matches!(
        scene.reparent(a, Some(a), false),
        Err(FableError::CycleDetected { .. })
    ));
}

// ============================================================================
// Removal
// ============================================================================

#[test]
fn remove_node_destroys_whole_subtree() {
    let mut scene = Scene::new();
    let root = scene.build_node("root").build().unwrap();
    let mid = scene.build_node("mid").with_parent(root).build().unwrap();
    let leaf_a = scene.build_node("leaf_a").with_parent(mid).build().unwrap();
    let leaf_b = scene.build_node("leaf_b").with_parent(mid).build().unwrap();
    let survivor = scene.build_node("survivor").build().unwrap();

    let removed = scene.remove_node(mid).unwrap();

    assert_eq!(removed.len(), 3);
    for h in [mid, leaf_a, leaf_b] {
        assert!(removed.contains(&h));
        assert!(scene.get_node(h).is_none(), "stale handle must not resolve");
    }
    assert!(scene.get_node(root).is_some());
    assert!(scene.get_node(survivor).is_some());
    assert!(scene.get_node(root).unwrap().children().is_empty());
}

#[test]
fn removing_missing_node_reports_not_found() {
    let mut scene = Scene::new();
    let a = scene.build_node("a").build().unwrap();
    scene.remove_node(a).unwrap();
    assert!(matches!(
        scene.remove_node(a),
        Err(FableError::NotFound(_))
    ));
}

#[test]
fn handle_stays_stale_after_slot_reuse() {
    let mut scene = Scene::new();
    let old = scene.build_node("old").build().unwrap();
    scene.remove_node(old).unwrap();

    // Force slot reuse; the generation must differ
    let new = scene.build_node("new").build().unwrap();
    assert_ne!(old, new);
    assert!(scene.get_node(old).is_none());
    assert_eq!(scene.get_node(new).unwrap().name, "new");
}

#[test]
fn removal_cleans_component_pools() {
    let mut scene = Scene::new();
    let node = scene
        .build_node("lit")
        .with_light(Light::new_point(Vec3::ONE, 1.0, 10.0))
        .with_collider(Collider::new(ColliderShape::Sphere { radius: 1.0 }))
        .build()
        .unwrap();

    assert_eq!(scene.iter_lights().count(), 1);
    scene.remove_node(node).unwrap();
    assert_eq!(scene.iter_lights().count(), 0);
}

// ============================================================================
// Active camera
// ============================================================================

#[test]
fn active_camera_requires_camera_component() {
    let mut scene = Scene::new();
    let plain = scene.build_node("plain").build().unwrap();
    assert!(matches!(
        scene.set_active_camera(plain),
        Err(FableError::MissingCamera)
    ));

    let cam = scene
        .build_node("cam")
        .with_camera(Camera::new_perspective(60.0, 1.6, 0.1, 100.0))
        .build()
        .unwrap();
    scene.set_active_camera(cam).unwrap();
    assert_eq!(scene.active_camera_bundle().unwrap().0, cam);
}

#[test]
fn removing_active_camera_clears_selection() {
    let mut scene = Scene::new();
    let cam = scene
        .build_node("cam")
        .with_camera(Camera::new_perspective(60.0, 1.6, 0.1, 100.0))
        .build()
        .unwrap();
    scene.set_active_camera(cam).unwrap();

    scene.remove_node(cam).unwrap();
    assert!(scene.active_camera_bundle().is_none());
}

// ============================================================================
// World bounds
// ============================================================================

#[test]
fn world_bounds_follow_world_matrix() {
    let mut scene = Scene::new();
    let mesh;
    let material;
    {
        // Handles come from an asset server in production; any resolved pair works here
        let mut assets = fable::AssetServer::new();
        mesh = assets.register_mesh("cube");
        material = assets.register_material("default", false);
    }
    let node = scene
        .build_node("cube")
        .with_position(10.0, 0.0, 0.0)
        .with_mesh_renderer(MeshRenderer::new(mesh, material, unit_bounds()))
        .build()
        .unwrap();

    let mut moved = Vec::new();
    scene.update_matrix_world(&mut moved);

    let bounds = scene.world_bounds(node).unwrap();
    assert!((bounds.center() - Vec3::new(10.0, 0.0, 0.0)).length() < 1e-4);
    assert!((bounds.size() - Vec3::ONE).length() < 1e-4);
}

#[test]
fn collider_bounds_take_precedence_over_mesh() {
    let mut scene = Scene::new();
    let mut assets = fable::AssetServer::new();
    let mesh = assets.register_mesh("cube");
    let material = assets.register_material("default", false);

    let node = scene
        .build_node("both")
        .with_mesh_renderer(MeshRenderer::new(mesh, material, unit_bounds()))
        .with_collider(Collider::new(ColliderShape::Box(Vec3::splat(3.0))))
        .build()
        .unwrap();

    let mut moved = Vec::new();
    scene.update_matrix_world(&mut moved);

    let bounds = scene.world_bounds(node).unwrap();
    assert!((bounds.size() - Vec3::splat(6.0)).length() < 1e-4);
}

#[test]
fn node_without_spatial_component_has_no_bounds() {
    let mut scene = Scene::new();
    let node = scene.build_node("empty").build().unwrap();
    let mut moved = Vec::new();
    scene.update_matrix_world(&mut moved);
    assert!(scene.world_bounds(node).is_none());
}

#[test]
fn rotated_bounds_are_refit_to_axes() {
    let mut scene = Scene::new();
    let node = scene
        .build_node("spun")
        .with_rotation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_4))
        .with_collider(Collider::new(ColliderShape::Box(Vec3::new(1.0, 1.0, 1.0))))
        .build()
        .unwrap();

    let mut moved = Vec::new();
    scene.update_matrix_world(&mut moved);

    // A 45° yaw widens the XZ footprint to sqrt(2) per half extent
    let bounds = scene.world_bounds(node).unwrap();
    let expected = std::f32::consts::SQRT_2;
    assert!((bounds.max.x - expected).abs() < 1e-3);
    assert!((bounds.max.z - expected).abs() < 1e-3);
    assert!((bounds.max.y - 1.0).abs() < 1e-3);
}
