//! 帧调度模块
//!
//! 每 tick 一次、逻辑单线程地执行
//! Ingest → Propagate → Reindex → Cull → Emit 流水线：
//! - command: 延迟到下一次 Ingest 统一应用的场景变更队列
//! - render_queue: 有序去重的绘制命令表与后端提交接口
//! - scheduler: 阶段状态机本体

pub mod command;
pub mod render_queue;
pub mod scheduler;

pub use command::{CommandQueue, SceneCommand};
pub use render_queue::{RenderBackend, RenderItem, RenderQueue};
pub use scheduler::{CameraInput, FramePhase, FrameReport, FrameScheduler, SchedulerConfig};
