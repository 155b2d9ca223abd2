//! 场景图系统模块
//!
//! 管理场景层级结构和组件：
//! - Node: 场景节点（支持父子关系和变换）
//! - Transform: 变换组件（位置、旋转、缩放）
//! - Scene: 场景容器和结构化操作（add / remove / reparent）
//! - Camera: 相机组件和视锥体
//! - Light: 光源组件
//! - TransformSystem: 解耦的变换更新系统

pub mod camera;
pub mod light;
pub mod node;
pub mod scene;
pub mod transform;
pub mod transform_system;

// 重新导出常用类型
pub use camera::{Camera, Containment, Frustum, ProjectionType};
pub use light::{Light, LightKind};
pub use node::{Collider, ColliderShape, MeshRenderer, Node, NodeFlags};
pub use scene::Scene;
pub use transform::Transform;

use slotmap::new_key_type;

new_key_type! {
    /// Generational handle of a scene node.
    ///
    /// Stable for the node's lifetime; after the node is removed the handle
    /// never resolves again, even if the slot is reused.
    pub struct NodeHandle;

    pub struct MeshRendererKey;
    pub struct CameraKey;
    pub struct LightKey;
    pub struct ColliderKey;
}
