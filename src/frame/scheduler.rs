//! 帧调度器 (Frame Scheduler)
//!
//! 每 tick 按 `Idle → Ingest → Propagate → Reindex → Cull → Emit → Idle`
//! 推进一遍，逻辑单线程，帧与帧之间不重叠：
//!
//! 1. **Ingest**: 应用相机/输入快照和上一帧排队的场景变更
//! 2. **Propagate**: 场景图世界矩阵传播
//! 3. **Reindex**: 世界包围盒变化的节点刷新空间索引（屏障：完成后 Cull 才开始）
//! 4. **Cull**: 视锥查询 + 每个碰撞体节点的宽阶段邻域查询
//! 5. **Emit**: 生成、排序并提交渲染队列
//!
//! 空间索引是唯一被多个阶段触碰的结构：Reindex 单写者，
//! Cull 与外部宽阶段多读者，由阶段顺序而非锁保证。
//!
//! 失败语义：缺少相机时本 tick 跳过 Cull/Emit（不产出绘制表，引擎继续）；
//! 句柄未解析的节点跳过并告警，不影响兄弟节点。本模块不会中止 tick 循环。

use glam::{Quat, Vec3};

use crate::assets::AssetServer;
use crate::errors::FableError;
use crate::frame::command::{CommandQueue, SceneCommand};
use crate::frame::render_queue::{RenderBackend, RenderItem, RenderQueue};
use crate::scene::node::Node;
use crate::scene::{NodeHandle, Scene};
use crate::spatial::bounds::BoundingBox;
use crate::spatial::octree::{Octree, OctreeConfig, RayHit};
use crate::spatial::ray::Ray;

/// 流水线阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    Ingest,
    Propagate,
    Reindex,
    Cull,
    Emit,
}

/// 每 tick 的相机快照，由窗口/输入协作方提供。缺席是合法状态。
#[derive(Debug, Clone, Copy)]
pub struct CameraInput {
    pub position: Vec3,
    pub rotation: Quat,
    /// 垂直视场角（弧度）
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

/// 调度器调参
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub octree: OctreeConfig,
    /// 宽阶段邻域查询时碰撞体包围盒的外扩余量
    pub broad_phase_margin: f32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            octree: OctreeConfig::default(),
            broad_phase_margin: 0.5,
        }
    }
}

/// 单个 tick 的执行摘要。
///
/// 告警在此聚合（同时走 log 输出），tick 循环从不因此中止。
#[derive(Debug, Default)]
pub struct FrameReport {
    pub frame: u64,
    pub commands_applied: usize,
    pub commands_failed: usize,
    /// 本帧世界矩阵变化的节点数
    pub moved: usize,
    /// 视锥查询返回的实体数
    pub visible: usize,
    /// 实际写入渲染队列的条目数
    pub drawn: usize,
    /// 因句柄未解析被跳过的节点数
    pub skipped_unresolved: usize,
    /// 宽阶段候选对数量
    pub broad_phase_pairs: usize,
    /// 缺少相机，Cull/Emit 被跳过
    pub cull_skipped: bool,
    pub warnings: Vec<FableError>,
}

pub struct FrameScheduler {
    config: SchedulerConfig,
    phase: FramePhase,
    frame_count: u64,

    commands: CommandQueue,
    octree: Octree,
    render_queue: RenderQueue,

    // === 帧内暂存 (容量跨帧复用) ===
    moved: Vec<NodeHandle>,
    visible: Vec<NodeHandle>,
    region_scratch: Vec<NodeHandle>,
    broad_phase: Vec<(NodeHandle, Vec<NodeHandle>)>,
}

impl FrameScheduler {
    #[must_use]
    pub fn new(world_region: BoundingBox, config: SchedulerConfig) -> Self {
        Self {
            config,
            phase: FramePhase::Idle,
            frame_count: 0,
            commands: CommandQueue::new(),
            octree: Octree::new(world_region, config.octree),
            render_queue: RenderQueue::new(),
            moved: Vec::new(),
            visible: Vec::new(),
            region_scratch: Vec::new(),
            broad_phase: Vec::new(),
        }
    }

    /// 外部调用方（gameplay/GUI 线程）用来排队变更的句柄
    #[must_use]
    pub fn commands(&self) -> CommandQueue {
        self.commands.clone()
    }

    #[must_use]
    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// 空间索引的只读访问（外部宽阶段物理在 tick 之间读取）
    #[must_use]
    pub fn octree(&self) -> &Octree {
        &self.octree
    }

    /// 最近一次 Cull 的宽阶段候选集：(碰撞体节点, 候选邻居)
    #[must_use]
    pub fn broad_phase_candidates(&self) -> &[(NodeHandle, Vec<NodeHandle>)] {
        &self.broad_phase
    }

    /// 本帧世界矩阵发生变化的节点（音频等订阅方读取）
    #[must_use]
    pub fn moved_nodes(&self) -> &[NodeHandle] {
        &self.moved
    }

    /// 射线拾取直通（两次 tick 之间只读）
    #[must_use]
    pub fn raycast(&self, ray: &Ray) -> Option<RayHit> {
        self.octree.raycast(ray)
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// 执行一个完整 tick。帧不可中途取消；
    /// 先决状态缺失时的取消单位是“跳过本 tick 的 Cull/Emit”。
    pub fn tick(
        &mut self,
        scene: &mut Scene,
        assets: &AssetServer,
        camera_input: Option<&CameraInput>,
        backend: &mut dyn RenderBackend,
    ) -> FrameReport {
        debug_assert_eq!(self.phase, FramePhase::Idle, "tick is not reentrant");

        let mut report = FrameReport {
            frame: self.frame_count,
            ..FrameReport::default()
        };

        self.ingest(scene, camera_input, &mut report);
        self.propagate(scene, &mut report);
        self.reindex(scene);

        let camera_ok = self.cull(scene, &mut report);
        if camera_ok {
            self.emit(scene, assets, backend, &mut report);
        }

        self.phase = FramePhase::Idle;
        self.frame_count += 1;
        report
    }

    // ------------------------------------------------------------------------
    // Phase 1: Ingest
    // ------------------------------------------------------------------------

    fn ingest(
        &mut self,
        scene: &mut Scene,
        camera_input: Option<&CameraInput>,
        report: &mut FrameReport,
    ) {
        self.phase = FramePhase::Ingest;

        // 1. 上一帧排队的变更，按入队顺序原子应用
        for command in self.commands.drain() {
            match Self::apply_command(scene, command) {
                Ok(()) => report.commands_applied += 1,
                Err(err) => {
                    log::warn!("Deferred command rejected: {err}");
                    report.commands_failed += 1;
                    report.warnings.push(err);
                }
            }
        }

        // 2. 相机快照
        if let Some(input) = camera_input
            && let Some(cam_handle) = scene.active_camera
        {
            if let Err(err) =
                scene.set_local_transform(cam_handle, input.position, input.rotation, Vec3::ONE)
            {
                log::warn!("Camera input dropped: {err}");
                report.warnings.push(err);
            } else if let Some(key) = scene.get_node(cam_handle).and_then(Node::camera_key)
                && let Some(camera) = scene.camera_mut(key)
            {
                camera.fov = input.fov;
                camera.aspect = input.aspect;
                camera.near = input.near;
                camera.far = input.far;
                camera.update_projection_matrix();
            }
        }
    }

    fn apply_command(scene: &mut Scene, command: SceneCommand) -> crate::errors::Result<()> {
        match command {
            SceneCommand::AddNode { parent, node } => {
                scene.add_node(parent, *node)?;
            }
            SceneCommand::RemoveNode { handle } => {
                // 死句柄由 Reindex 的存活清扫统一驱逐
                scene.remove_node(handle)?;
            }
            SceneCommand::Reparent {
                handle,
                new_parent,
                keep_world,
            } => scene.reparent(handle, new_parent, keep_world)?,
            SceneCommand::SetLocalTransform {
                handle,
                position,
                rotation,
                scale,
            } => scene.set_local_transform(handle, position, rotation, scale)?,
            SceneCommand::SetActiveCamera { handle } => scene.set_active_camera(handle)?,
            SceneCommand::SetVisible { handle, visible } => {
                scene
                    .get_node_mut(handle)
                    .ok_or(FableError::NotFound(handle))?
                    .set_visible(visible);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Phase 2: Propagate
    // ------------------------------------------------------------------------

    fn propagate(&mut self, scene: &mut Scene, report: &mut FrameReport) {
        self.phase = FramePhase::Propagate;
        self.moved.clear();
        scene.update_matrix_world(&mut self.moved);
        report.moved = self.moved.len();
    }

    // ------------------------------------------------------------------------
    // Phase 3: Reindex (单写者；完成是 Cull 的屏障)
    // ------------------------------------------------------------------------

    fn reindex(&mut self, scene: &Scene) {
        self.phase = FramePhase::Reindex;
        self.octree.begin_tick();

        // 1. 驱逐已销毁的节点。按存活谓词清扫而不是只看命令队列：
        //    节点也可能绕过队列、经由 `scene.remove_node` 直接销毁
        self.octree.retain(|handle| scene.get_node(handle).is_some());

        // 2. 世界包围盒变化的节点增量刷新
        for &handle in &self.moved {
            match scene.world_bounds(handle) {
                Some(bounds) => self.octree.update(handle, bounds),
                // 失去包围盒（组件被摘除）的节点退出索引
                None => {
                    self.octree.remove(handle);
                }
            }
        }

        // 3. 失衡防护：移动占比超阈值时整树重建
        if self.octree.needs_rebuild() {
            log::debug!(
                "Octree rebuild triggered at frame {} ({} entities)",
                self.frame_count,
                self.octree.len()
            );
            self.octree.rebuild();
        }
    }

    // ------------------------------------------------------------------------
    // Phase 4: Cull
    // ------------------------------------------------------------------------

    /// 返回 false 表示缺少相机，本 tick 的 Emit 一并跳过
    fn cull(&mut self, scene: &Scene, report: &mut FrameReport) -> bool {
        self.phase = FramePhase::Cull;
        self.visible.clear();
        self.broad_phase.clear();

        let Some((_, camera)) = scene.active_camera_bundle() else {
            log::warn!("No active camera; skipping Cull/Emit for this tick");
            report.warnings.push(FableError::MissingCamera);
            report.cull_skipped = true;
            self.render_queue.clear();
            return false;
        };

        // 1. 视锥剔除
        self.octree.query_frustum(camera.frustum(), &mut self.visible);
        report.visible = self.visible.len();

        // 2. 宽阶段：每个碰撞体节点的邻域候选（窄阶段归外部物理）
        for (handle, node) in scene.iter_nodes() {
            let Some(collider_key) = node.collider_key() else {
                continue;
            };
            let Some(collider) = scene.collider(collider_key) else {
                continue;
            };
            let Some(bounds) = scene.world_bounds(handle) else {
                continue;
            };

            self.region_scratch.clear();
            self.octree.query_region(
                &bounds.inflate(self.config.broad_phase_margin),
                &mut self.region_scratch,
            );

            let candidates: Vec<NodeHandle> = self
                .region_scratch
                .iter()
                .copied()
                .filter(|&other| {
                    if other == handle {
                        return false;
                    }
                    // 候选必须自带碰撞体且层掩码有交集
                    scene
                        .get_node(other)
                        .and_then(|n| n.collider_key())
                        .and_then(|k| scene.collider(k))
                        .is_some_and(|c| c.layer & collider.layer != 0)
                })
                .collect();

            if !candidates.is_empty() {
                report.broad_phase_pairs += candidates.len();
                self.broad_phase.push((handle, candidates));
            }
        }

        true
    }

    // ------------------------------------------------------------------------
    // Phase 5: Emit
    // ------------------------------------------------------------------------

    fn emit(
        &mut self,
        scene: &Scene,
        assets: &AssetServer,
        backend: &mut dyn RenderBackend,
        report: &mut FrameReport,
    ) {
        self.phase = FramePhase::Emit;
        self.render_queue.clear();

        let Some((_, camera)) = scene.active_camera_bundle() else {
            return;
        };
        let camera_pos = camera.world_position();

        for &handle in &self.visible {
            let Some(node) = scene.get_node(handle) else {
                continue;
            };
            if !node.is_visible() {
                continue;
            }
            let Some(key) = node.mesh_renderer() else {
                continue;
            };
            let Some(renderer) = scene.mesh_renderer(key) else {
                continue;
            };

            // 未解析句柄：跳过该节点并告警，兄弟节点不受影响
            if !assets.mesh_resolved(renderer.mesh) {
                let err = FableError::UnresolvedHandle {
                    node: handle,
                    what: "mesh",
                };
                log::warn!("{err}");
                report.warnings.push(err);
                report.skipped_unresolved += 1;
                continue;
            }
            if !assets.material_resolved(renderer.material) {
                let err = FableError::UnresolvedHandle {
                    node: handle,
                    what: "material",
                };
                log::warn!("{err}");
                report.warnings.push(err);
                report.skipped_unresolved += 1;
                continue;
            }

            let world = node.transform.world_matrix();
            let distance_sq = camera_pos.distance_squared(world.translation.into());

            self.render_queue.push(RenderItem {
                node: handle,
                mesh: renderer.mesh,
                material: renderer.material,
                world_matrix: node.transform.world_matrix_as_mat4(),
                batch_key: assets.material_batch_key(renderer.material),
                distance_sq,
                transparent: assets.material_transparent(renderer.material).unwrap_or(false),
            });
        }

        self.render_queue.sort();
        report.drawn = self.render_queue.len();
        backend.submit(&self.render_queue);
    }
}
