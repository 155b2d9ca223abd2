//! 渲染队列 (Render Queue)
//!
//! Emit 阶段的产物：一张有序的绘制命令表，按值快照，仅在当帧有效。
//! 外部光栅化后端按给定顺序发出绘制调用，特别是不得重排透明项。
//!
//! 排序契约：
//! 1. 不透明项在前，按材质批次键升序（相同材质相邻，利于状态合批），
//!    同批次内按网格键稳定
//! 2. 透明项在后，按相机距离由远及近（back-to-front）

use glam::Mat4;

use crate::assets::{MaterialHandle, MeshHandle};
use crate::scene::NodeHandle;

/// 一条绘制命令。
///
/// 世界矩阵是发射时刻的拷贝而非活引用，后续帧的场景变动不会穿透进来。
#[derive(Debug, Clone)]
pub struct RenderItem {
    /// 来源节点（调试和回溯用）
    pub node: NodeHandle,
    pub mesh: MeshHandle,
    pub material: MaterialHandle,
    /// 世界矩阵快照
    pub world_matrix: Mat4,
    /// 材质批次键（不透明排序主键）
    pub batch_key: u64,
    /// 到相机的距离平方（透明排序键）
    pub distance_sq: f32,
    pub transparent: bool,
}

/// 单帧的有序绘制表
#[derive(Debug, Default)]
pub struct RenderQueue {
    items: Vec<RenderItem>,
}

impl RenderQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: RenderItem) {
        self.items.push(item);
    }

    /// 应用排序契约。Emit 阶段在提交给后端前调用一次。
    pub fn sort(&mut self) {
        self.items.sort_by(|a, b| {
            a.transparent.cmp(&b.transparent).then_with(|| {
                if a.transparent {
                    // back-to-front
                    b.distance_sq.total_cmp(&a.distance_sq)
                } else {
                    a.batch_key
                        .cmp(&b.batch_key)
                        .then_with(|| a.mesh.cmp(&b.mesh))
                }
            })
        });
    }

    /// 新的一帧开始前清空（容量保留复用）
    pub fn clear(&mut self) {
        self.items.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn items(&self) -> &[RenderItem] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RenderItem> {
        self.items.iter()
    }
}

impl<'a> IntoIterator for &'a RenderQueue {
    type Item = &'a RenderItem;
    type IntoIter = std::slice::Iter<'a, RenderItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// 外部渲染后端的提交接口。
///
/// 后端按队列顺序消费，不向核心返回任何数据。
pub trait RenderBackend {
    fn submit(&mut self, queue: &RenderQueue);
}

/// 丢弃一切的后端，测试和无头运行用
#[derive(Debug, Default)]
pub struct NullBackend {
    pub frames_submitted: u64,
    pub last_item_count: usize,
}

impl RenderBackend for NullBackend {
    fn submit(&mut self, queue: &RenderQueue) {
        self.frames_submitted += 1;
        self.last_item_count = queue.len();
    }
}
