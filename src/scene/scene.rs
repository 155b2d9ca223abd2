use std::sync::atomic::{AtomicU32, Ordering};

use glam::{Affine3A, Quat, Vec3};
use slotmap::SlotMap;

use crate::errors::{FableError, Result};
use crate::scene::camera::Camera;
use crate::scene::light::Light;
use crate::scene::node::{Collider, MeshRenderer, Node};
use crate::scene::transform::Transform;
use crate::scene::transform_system;
use crate::scene::{CameraKey, ColliderKey, LightKey, MeshRendererKey, NodeHandle};
use crate::spatial::bounds::BoundingBox;

static NEXT_SCENE_ID: AtomicU32 = AtomicU32::new(1);

/// 场景图结构
///
/// Scene 是纯数据层，独占持有节点森林和组件池。
/// 空间索引只保存非持有引用（NodeHandle + 包围盒缓存），
/// 始终可以从 Scene 状态重建——Scene 是唯一的数据源。
pub struct Scene {
    pub id: u32,

    pub(crate) nodes: SlotMap<NodeHandle, Node>,
    pub root_nodes: Vec<NodeHandle>,

    // ====组件池====
    pub(crate) mesh_renderers: SlotMap<MeshRendererKey, MeshRenderer>,
    pub(crate) cameras: SlotMap<CameraKey, Camera>,
    pub(crate) lights: SlotMap<LightKey, Light>,
    pub(crate) colliders: SlotMap<ColliderKey, Collider>,

    pub active_camera: Option<NodeHandle>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NEXT_SCENE_ID.fetch_add(1, Ordering::Relaxed),

            nodes: SlotMap::with_key(),
            root_nodes: Vec::new(),

            mesh_renderers: SlotMap::with_key(),
            cameras: SlotMap::with_key(),
            lights: SlotMap::with_key(),
            colliders: SlotMap::with_key(),

            active_camera: None,
        }
    }

    // ========================================================================
    // 结构化操作 (Structural Mutation)
    // ========================================================================

    /// 添加一个节点到场景。
    ///
    /// `parent` 为 None 时作为根节点；否则挂在 `parent` 下，
    /// `parent` 无法解析时返回 [`FableError::InvalidParent`]，场景不变。
    pub fn add_node(&mut self, parent: Option<NodeHandle>, node: Node) -> Result<NodeHandle> {
        if let Some(p) = parent
            && !self.nodes.contains_key(p)
        {
            return Err(FableError::InvalidParent(p));
        }

        let handle = self.nodes.insert(node);

        if let Some(p) = parent {
            self.nodes[handle].parent = Some(p);
            self.nodes[p].children.push(handle);
        } else {
            self.root_nodes.push(handle);
        }

        // 新节点的世界矩阵在下一次传播中计算
        self.nodes[handle].transform.mark_dirty();
        Ok(handle)
    }

    /// 移除节点 (递归移除所有子节点)。
    ///
    /// 返回被销毁的全部句柄（先自身，后子孙），调用方用它
    /// 将死节点从空间索引中驱逐。句柄此后永不再解析。
    pub fn remove_node(&mut self, handle: NodeHandle) -> Result<Vec<NodeHandle>> {
        if !self.nodes.contains_key(handle) {
            return Err(FableError::NotFound(handle));
        }

        // 1. 从父节点 (或 root_nodes) 摘链
        let parent_opt = self.nodes[handle].parent;
        if let Some(parent) = parent_opt {
            if let Some(p) = self.nodes.get_mut(parent)
                && let Some(pos) = p.children.iter().position(|&c| c == handle)
            {
                p.children.remove(pos);
            }
        } else if let Some(pos) = self.root_nodes.iter().position(|&r| r == handle) {
            self.root_nodes.remove(pos);
        }

        // 2. 迭代销毁整棵子树，避免深层级递归
        let mut removed = Vec::new();
        let mut stack = vec![handle];
        while let Some(idx) = stack.pop() {
            let Some(node) = self.nodes.remove(idx) else {
                continue;
            };
            stack.extend(node.children.iter().copied());

            // === 清理组件 ===
            if let Some(k) = node.mesh {
                self.mesh_renderers.remove(k);
            }
            if let Some(k) = node.camera {
                self.cameras.remove(k);
            }
            if let Some(k) = node.light {
                self.lights.remove(k);
            }
            if let Some(k) = node.collider {
                self.colliders.remove(k);
            }

            if self.active_camera == Some(idx) {
                self.active_camera = None;
            }
            removed.push(idx);
        }

        Ok(removed)
    }

    /// 改变节点的父节点。
    ///
    /// `keep_world = true` 时重算局部变换以保持世界位姿不变
    /// （对象不会视觉跳变）。`new_parent` 是自身或自身的子孙时
    /// 返回 [`FableError::CycleDetected`]，场景不变。
    pub fn reparent(
        &mut self,
        handle: NodeHandle,
        new_parent: Option<NodeHandle>,
        keep_world: bool,
    ) -> Result<()> {
        if !self.nodes.contains_key(handle) {
            return Err(FableError::NotFound(handle));
        }
        if let Some(p) = new_parent {
            if !self.nodes.contains_key(p) {
                return Err(FableError::InvalidParent(p));
            }
            // 沿祖先链按句柄上行，提交前检出环
            if p == handle || self.is_descendant(p, handle) {
                return Err(FableError::CycleDetected {
                    child: handle,
                    parent: p,
                });
            }
        }

        // 保持世界位姿：new_local = new_parent.world⁻¹ × world
        let preserved_local = if keep_world {
            let world = self.compute_world_matrix(handle);
            let parent_world = match new_parent {
                Some(p) => self.compute_world_matrix(p),
                None => Affine3A::IDENTITY,
            };
            Some(parent_world.inverse() * world)
        } else {
            None
        };

        // 1. Detach from old
        let old_parent = self.nodes[handle].parent;
        if let Some(p) = old_parent {
            if let Some(n) = self.nodes.get_mut(p)
                && let Some(i) = n.children.iter().position(|&c| c == handle)
            {
                n.children.remove(i);
            }
        } else if let Some(i) = self.root_nodes.iter().position(|&r| r == handle) {
            self.root_nodes.remove(i);
        }

        // 2. Attach to new
        if let Some(p) = new_parent {
            self.nodes[p].children.push(handle);
            self.nodes[handle].parent = Some(p);
        } else {
            self.nodes[handle].parent = None;
            self.root_nodes.push(handle);
        }

        // 3. Update transform
        let node = &mut self.nodes[handle];
        if let Some(local) = preserved_local {
            node.transform.apply_local_matrix(local);
        } else {
            node.transform.mark_dirty();
        }

        Ok(())
    }

    /// 替换节点的局部 TRS，子孙在下一次传播中跟随更新。
    pub fn set_local_transform(
        &mut self,
        handle: NodeHandle,
        position: Vec3,
        rotation: Quat,
        scale: Vec3,
    ) -> Result<()> {
        let node = self
            .nodes
            .get_mut(handle)
            .ok_or(FableError::NotFound(handle))?;
        node.transform.position = position;
        node.transform.rotation = rotation;
        node.transform.scale = scale;
        node.transform.mark_dirty();
        Ok(())
    }

    /// `maybe_ancestor` 是否位于 `node` 的祖先链上（不含自身）
    fn is_descendant(&self, node: NodeHandle, maybe_ancestor: NodeHandle) -> bool {
        let mut cursor = self.nodes.get(node).and_then(|n| n.parent);
        while let Some(p) = cursor {
            if p == maybe_ancestor {
                return true;
            }
            cursor = self.nodes.get(p).and_then(|n| n.parent);
        }
        false
    }

    /// 按需计算节点的最新世界矩阵。
    ///
    /// 沿祖先链自根向下复合各节点的有效局部矩阵，不写入任何缓存，
    /// 也不消费脏标记。供 reparent 在两次传播之间也能得到精确位姿。
    fn compute_world_matrix(&self, handle: NodeHandle) -> Affine3A {
        // 收集自身到根的链
        let mut chain = Vec::new();
        let mut cursor = Some(handle);
        while let Some(idx) = cursor {
            chain.push(idx);
            cursor = self.nodes.get(idx).and_then(|n| n.parent);
        }

        // 自根向下复合
        let mut world = Affine3A::IDENTITY;
        for &idx in chain.iter().rev() {
            world *= self.nodes[idx].transform.effective_local_matrix();
        }
        world
    }

    // ========================================================================
    // 节点访问
    // ========================================================================

    /// 获取只读引用
    #[must_use]
    pub fn get_node(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle)
    }

    /// 获取可变引用 (用于修改 TRS)
    #[must_use]
    pub fn get_node_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.nodes.get_mut(handle)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn iter_nodes(&self) -> impl Iterator<Item = (NodeHandle, &Node)> {
        self.nodes.iter()
    }

    /// 开始构建一个节点
    pub fn build_node(&'_ mut self, name: &str) -> NodeBuilder<'_> {
        NodeBuilder::new(self, name)
    }

    // ========================================================================
    // 组件管理 (Component Attachment)
    // ========================================================================

    pub fn set_mesh_renderer(
        &mut self,
        handle: NodeHandle,
        renderer: MeshRenderer,
    ) -> Result<MeshRendererKey> {
        if !self.nodes.contains_key(handle) {
            return Err(FableError::NotFound(handle));
        }
        if let Some(old) = self.nodes[handle].mesh.take() {
            self.mesh_renderers.remove(old);
        }
        let key = self.mesh_renderers.insert(renderer);
        self.nodes[handle].mesh = Some(key);
        // 触发下一次传播，让新包围盒进入空间索引
        self.nodes[handle].transform.mark_dirty();
        Ok(key)
    }

    pub fn set_camera(&mut self, handle: NodeHandle, camera: Camera) -> Result<CameraKey> {
        if !self.nodes.contains_key(handle) {
            return Err(FableError::NotFound(handle));
        }
        if let Some(old) = self.nodes[handle].camera.take() {
            self.cameras.remove(old);
        }
        let key = self.cameras.insert(camera);
        self.nodes[handle].camera = Some(key);
        Ok(key)
    }

    pub fn set_light(&mut self, handle: NodeHandle, light: Light) -> Result<LightKey> {
        if !self.nodes.contains_key(handle) {
            return Err(FableError::NotFound(handle));
        }
        if let Some(old) = self.nodes[handle].light.take() {
            self.lights.remove(old);
        }
        let key = self.lights.insert(light);
        self.nodes[handle].light = Some(key);
        Ok(key)
    }

    pub fn set_collider(&mut self, handle: NodeHandle, collider: Collider) -> Result<ColliderKey> {
        if !self.nodes.contains_key(handle) {
            return Err(FableError::NotFound(handle));
        }
        if let Some(old) = self.nodes[handle].collider.take() {
            self.colliders.remove(old);
        }
        let key = self.colliders.insert(collider);
        self.nodes[handle].collider = Some(key);
        self.nodes[handle].transform.mark_dirty();
        Ok(key)
    }

    #[must_use]
    pub fn mesh_renderer(&self, key: MeshRendererKey) -> Option<&MeshRenderer> {
        self.mesh_renderers.get(key)
    }

    #[must_use]
    pub fn camera(&self, key: CameraKey) -> Option<&Camera> {
        self.cameras.get(key)
    }

    #[must_use]
    pub fn camera_mut(&mut self, key: CameraKey) -> Option<&mut Camera> {
        self.cameras.get_mut(key)
    }

    #[must_use]
    pub fn light(&self, key: LightKey) -> Option<&Light> {
        self.lights.get(key)
    }

    #[must_use]
    pub fn collider(&self, key: ColliderKey) -> Option<&Collider> {
        self.colliders.get(key)
    }

    /// 迭代场景中所有 (节点, 灯光) 对
    pub fn iter_lights(&self) -> impl Iterator<Item = (NodeHandle, &Node, &Light)> {
        self.nodes.iter().filter_map(|(handle, node)| {
            let light = self.lights.get(node.light?)?;
            Some((handle, node, light))
        })
    }

    // ========================================================================
    // 相机管理
    // ========================================================================

    pub fn set_active_camera(&mut self, handle: NodeHandle) -> Result<()> {
        let node = self.nodes.get(handle).ok_or(FableError::NotFound(handle))?;
        if node.camera.is_none() {
            return Err(FableError::MissingCamera);
        }
        self.active_camera = Some(handle);
        Ok(())
    }

    /// 主相机的 (节点句柄, 相机) 组合；没有可用相机时为 None
    #[must_use]
    pub fn active_camera_bundle(&self) -> Option<(NodeHandle, &Camera)> {
        let handle = self.active_camera?;
        let key = self.nodes.get(handle)?.camera?;
        Some((handle, self.cameras.get(key)?))
    }

    // ========================================================================
    // 矩阵更新流水线
    // ========================================================================

    /// 更新整个场景的世界矩阵。
    ///
    /// 每帧 Propagate 阶段调用一次；无中间变动时再次调用是幂等的。
    /// 世界矩阵实际发生变化的节点会被推入 `moved`，供 Reindex 使用。
    pub fn update_matrix_world(&mut self, moved: &mut Vec<NodeHandle>) {
        // 使用迭代版本避免深层级场景的栈溢出
        transform_system::update_hierarchy_iterative(
            &mut self.nodes,
            &mut self.cameras,
            &self.root_nodes,
            moved,
        );
    }

    /// 更新指定子树的世界矩阵，用于局部刷新。
    pub fn update_subtree(&mut self, root: NodeHandle, moved: &mut Vec<NodeHandle>) {
        transform_system::update_subtree(&mut self.nodes, &mut self.cameras, root, moved);
    }

    // ========================================================================
    // 包围盒
    // ========================================================================

    /// 节点的世界空间包围盒。
    ///
    /// 碰撞体优先于网格（宽阶段由碰撞体驱动）；两者都没有时为 None。
    /// 包围盒由最近一次传播写入的世界矩阵导出。
    #[must_use]
    pub fn world_bounds(&self, handle: NodeHandle) -> Option<BoundingBox> {
        let node = self.nodes.get(handle)?;

        let local = if let Some(key) = node.collider {
            self.colliders.get(key)?.local_bounds()
        } else {
            let key = node.mesh?;
            self.mesh_renderers.get(key)?.local_bounds
        };

        Some(local.transform(&node.transform.world_matrix))
    }
}

// ============================================================================
// NodeBuilder
// ============================================================================

pub struct NodeBuilder<'a> {
    scene: &'a mut Scene,
    node: Node,
    parent: Option<NodeHandle>,
    mesh: Option<MeshRenderer>,
    camera: Option<Camera>,
    light: Option<Light>,
    collider: Option<Collider>,
}

impl<'a> NodeBuilder<'a> {
    pub fn new(scene: &'a mut Scene, name: &str) -> Self {
        Self {
            scene,
            node: Node::new(name),
            parent: None,
            mesh: None,
            camera: None,
            light: None,
            collider: None,
        }
    }

    // === 链式配置方法 ===

    #[must_use]
    pub fn with_position(mut self, x: f32, y: f32, z: f32) -> Self {
        self.node.transform.position = Vec3::new(x, y, z);
        self
    }

    #[must_use]
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.node.transform.rotation = rotation;
        self
    }

    #[must_use]
    pub fn with_scale(mut self, s: f32) -> Self {
        self.node.transform.scale = Vec3::splat(s);
        self
    }

    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.node.transform = transform;
        self
    }

    /// 设置父节点
    #[must_use]
    pub fn with_parent(mut self, parent: NodeHandle) -> Self {
        self.parent = Some(parent);
        self
    }

    #[must_use]
    pub fn with_mesh_renderer(mut self, renderer: MeshRenderer) -> Self {
        self.mesh = Some(renderer);
        self
    }

    #[must_use]
    pub fn with_camera(mut self, camera: Camera) -> Self {
        self.camera = Some(camera);
        self
    }

    #[must_use]
    pub fn with_light(mut self, light: Light) -> Self {
        self.light = Some(light);
        self
    }

    #[must_use]
    pub fn with_collider(mut self, collider: Collider) -> Self {
        self.collider = Some(collider);
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: &str) -> Self {
        self.node.tag = Some(tag.to_string());
        self
    }

    // === 终结方法 ===

    /// 完成构建，将 Node 插入 Scene，返回句柄。
    /// 父节点无法解析时返回 [`FableError::InvalidParent`]。
    pub fn build(self) -> Result<NodeHandle> {
        let handle = self.scene.add_node(self.parent, self.node)?;

        if let Some(renderer) = self.mesh {
            self.scene.set_mesh_renderer(handle, renderer)?;
        }
        if let Some(camera) = self.camera {
            self.scene.set_camera(handle, camera)?;
        }
        if let Some(light) = self.light {
            self.scene.set_light(handle, light)?;
        }
        if let Some(collider) = self.collider {
            self.scene.set_collider(handle, collider)?;
        }

        Ok(handle)
    }
}
