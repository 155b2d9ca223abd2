//! 引擎门面 (Engine Facade)
//!
//! 把场景数据、资产注册表和帧调度器捆成一个对象，对外提供：
//! - `tick`: 驱动一帧流水线并把变换变化广播给订阅方（音频等）
//! - `commands`: 外部协作方排队延迟变更的入口
//! - `camera_state` / `viewport`: GUI 协作方的只读快照
//!
//! 引擎不拥有窗口、不做光栅化、不跑物理；这些协作方通过
//! [`RenderBackend`]、[`CommandQueue`] 和宽阶段候选集与核心交互。

use glam::{Mat4, Quat, Vec3};

use crate::assets::AssetServer;
use crate::frame::render_queue::RenderBackend;
use crate::frame::scheduler::{FrameReport, FrameScheduler, SchedulerConfig};
use crate::frame::CommandQueue;
use crate::scene::node::Node;
use crate::scene::{NodeHandle, Scene};
use crate::spatial::bounds::BoundingBox;
use crate::spatial::octree::RayHit;
use crate::spatial::ray::Ray;

pub use crate::frame::scheduler::CameraInput;

/// 主相机的只读快照，GUI 叠加层按帧读取。
#[derive(Debug, Clone, Copy)]
pub struct CameraState {
    pub node: NodeHandle,
    pub position: Vec3,
    pub rotation: Quat,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub view_projection: Mat4,
}

/// 视口尺寸，窗口协作方写入，相机纵横比随之更新。
#[derive(Debug, Clone, Copy)]
pub struct ViewportState {
    pub width: u32,
    pub height: u32,
}

impl ViewportState {
    #[must_use]
    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// 世界矩阵变化订阅方（音频空间化等）。
///
/// 每次 tick 结束后收到本帧实际移动节点的世界位置。
pub trait TransformListener {
    fn on_transforms(&mut self, moved: &[(NodeHandle, Vec3)]);
}

pub struct Engine {
    pub scene: Scene,
    pub assets: AssetServer,
    scheduler: FrameScheduler,
    viewport: ViewportState,
    listeners: Vec<Box<dyn TransformListener>>,
    moved_scratch: Vec<(NodeHandle, Vec3)>,
}

impl Engine {
    #[must_use]
    pub fn new(world_region: BoundingBox, config: SchedulerConfig) -> Self {
        Self {
            scene: Scene::new(),
            assets: AssetServer::new(),
            scheduler: FrameScheduler::new(world_region, config),
            viewport: ViewportState {
                width: 1280,
                height: 720,
            },
            listeners: Vec::new(),
            moved_scratch: Vec::new(),
        }
    }

    /// 延迟变更队列的克隆句柄，可交给任意线程
    #[must_use]
    pub fn commands(&self) -> CommandQueue {
        self.scheduler.commands()
    }

    #[must_use]
    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn add_transform_listener(&mut self, listener: Box<dyn TransformListener>) {
        self.listeners.push(listener);
    }

    /// 推进一帧。
    ///
    /// 流水线结束后把本帧移动节点的世界位置广播给订阅方。
    /// 任何内部失败都已降级处理并记入报告，调用方可以无脑循环。
    pub fn tick(
        &mut self,
        camera_input: Option<&CameraInput>,
        backend: &mut dyn RenderBackend,
    ) -> FrameReport {
        let report = self
            .scheduler
            .tick(&mut self.scene, &self.assets, camera_input, backend);

        if !self.listeners.is_empty() {
            self.moved_scratch.clear();
            for &handle in self.scheduler.moved_nodes() {
                if let Some(node) = self.scene.get_node(handle) {
                    self.moved_scratch
                        .push((handle, node.transform.world_position()));
                }
            }
            if !self.moved_scratch.is_empty() {
                for listener in &mut self.listeners {
                    listener.on_transforms(&self.moved_scratch);
                }
            }
        }

        report
    }

    /// 射线拾取（鼠标选取等），两次 tick 之间只读
    #[must_use]
    pub fn raycast(&self, ray: &Ray) -> Option<RayHit> {
        self.scheduler.raycast(ray)
    }

    // ========================================================================
    // GUI 协作方的只读视图
    // ========================================================================

    #[must_use]
    pub fn viewport(&self) -> ViewportState {
        self.viewport
    }

    /// 窗口尺寸变化时调用，主相机纵横比同步更新
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = ViewportState { width, height };

        let aspect = self.viewport.aspect();
        if let Some(handle) = self.scene.active_camera
            && let Some(key) = self.scene.get_node(handle).and_then(Node::camera_key)
            && let Some(camera) = self.scene.camera_mut(key)
        {
            camera.aspect = aspect;
            camera.update_projection_matrix();
        }
    }

    /// 主相机快照；没有可用相机时为 None
    #[must_use]
    pub fn camera_state(&self) -> Option<CameraState> {
        let (handle, camera) = self.scene.active_camera_bundle()?;
        let node = self.scene.get_node(handle)?;
        Some(CameraState {
            node: handle,
            position: node.transform.world_position(),
            rotation: node.transform.rotation,
            fov: camera.fov,
            aspect: camera.aspect,
            near: camera.near,
            far: camera.far,
            view_projection: camera.view_projection_matrix(),
        })
    }
}
