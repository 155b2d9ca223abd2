use std::borrow::Cow;

use bitflags::bitflags;
use glam::{Affine3A, Vec3};
use smallvec::SmallVec;

use crate::assets::{MaterialHandle, MeshHandle};
use crate::scene::transform::Transform;
use crate::scene::{CameraKey, ColliderKey, LightKey, MeshRendererKey, NodeHandle};
use crate::spatial::bounds::BoundingBox;

bitflags! {
    /// Per-node state flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u32 {
        /// Participates in culling and emission.
        const VISIBLE = 1 << 0;
        /// Hint that the node's world bounds never change after insertion.
        const STATIC  = 1 << 1;
    }
}

impl Default for NodeFlags {
    fn default() -> Self {
        NodeFlags::VISIBLE
    }
}

/// A minimal scene node containing only essential hot data.
///
/// # Design Principles
///
/// - Only keeps data that must be traversed every frame (hierarchy and transform)
/// - Component payloads (MeshRenderer, Camera, Light, Collider) are stored in
///   the Scene's component pools; the node holds optional keys into them
/// - Improves CPU cache hit rate by keeping nodes small and contiguous
///
/// # Hierarchy
///
/// Nodes form a forest through parent-child relationships:
/// - `parent`: Optional handle to parent node (None for root nodes)
/// - `children`: List of child node handles, in attach order
#[derive(Debug, Clone, Default)]
pub struct Node {
    // === Core Hierarchy ===
    /// Parent node handle (None for root nodes)
    pub(crate) parent: Option<NodeHandle>,
    /// Child node handles
    pub(crate) children: SmallVec<[NodeHandle; 4]>,

    // === Core Spatial Data ===
    /// Transform component (hot data accessed every frame)
    pub transform: Transform,

    // === Core State ===
    pub flags: NodeFlags,
    pub name: Cow<'static, str>,

    // === Component Keys (closed set) ===
    pub(crate) mesh: Option<MeshRendererKey>,
    pub(crate) camera: Option<CameraKey>,
    pub(crate) light: Option<LightKey>,
    pub(crate) collider: Option<ColliderKey>,
    /// Free-form marker, the only inline component payload.
    pub tag: Option<String>,
}

impl Node {
    /// Creates a new node with default transform and visibility.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: Cow::Owned(name.to_string()),
            flags: NodeFlags::default(),
            ..Self::default()
        }
    }

    /// Returns the parent node handle, if any.
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    /// Returns a read-only slice of child node handles.
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.flags.contains(NodeFlags::VISIBLE)
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.flags.set(NodeFlags::VISIBLE, visible);
    }

    /// Returns the mesh renderer key, if the node is drawable.
    #[inline]
    #[must_use]
    pub fn mesh_renderer(&self) -> Option<MeshRendererKey> {
        self.mesh
    }

    #[inline]
    #[must_use]
    pub fn camera_key(&self) -> Option<CameraKey> {
        self.camera
    }

    #[inline]
    #[must_use]
    pub fn light_key(&self) -> Option<LightKey> {
        self.light
    }

    #[inline]
    #[must_use]
    pub fn collider_key(&self) -> Option<ColliderKey> {
        self.collider
    }

    /// Returns a reference to the world transformation matrix.
    ///
    /// This matrix transforms local coordinates to world coordinates.
    /// It is updated by the transform system during Propagate.
    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> &Affine3A {
        &self.transform.world_matrix
    }
}

// ============================================================================
// Drawable component
// ============================================================================

/// 可绘制组件：网格 + 材质句柄加上局部空间包围盒。
///
/// 句柄是不透明的，核心只校验其有效性，从不解析内容。
#[derive(Debug, Clone)]
pub struct MeshRenderer {
    pub mesh: MeshHandle,
    pub material: MaterialHandle,
    /// 局部空间包围盒，乘以世界矩阵后供空间索引使用
    pub local_bounds: BoundingBox,
}

impl MeshRenderer {
    #[must_use]
    pub fn new(mesh: MeshHandle, material: MaterialHandle, local_bounds: BoundingBox) -> Self {
        Self {
            mesh,
            material,
            local_bounds,
        }
    }
}

// ============================================================================
// Broad-phase collider component
// ============================================================================

/// Collider shape for broad-phase candidate generation.
///
/// Narrow-phase testing and collision response belong to the external
/// physics collaborator; the core only produces candidate sets.
#[derive(Debug, Clone, Copy)]
pub enum ColliderShape {
    /// Axis-aligned box, given as half extents.
    Box(Vec3),
    Sphere {
        radius: f32,
    },
}

#[derive(Debug, Clone)]
pub struct Collider {
    pub shape: ColliderShape,
    /// Broad-phase layer mask (candidates must share a bit).
    pub layer: u32,
}

impl Collider {
    #[must_use]
    pub fn new(shape: ColliderShape) -> Self {
        Self { shape, layer: 1 }
    }

    /// Local-space bounds enclosing the shape.
    #[must_use]
    pub fn local_bounds(&self) -> BoundingBox {
        match self.shape {
            ColliderShape::Box(half) => BoundingBox {
                min: -half,
                max: half,
            },
            ColliderShape::Sphere { radius } => BoundingBox {
                min: Vec3::splat(-radius),
                max: Vec3::splat(radius),
            },
        }
    }
}
