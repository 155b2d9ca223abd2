//! 八叉树空间索引
//!
//! 以实体的世界空间包围盒为键的松散层级索引：
//! - 实体存放在“完全包含其包围盒的最小节点”中，且同一时刻只存在于一个节点
//! - 跨越多个八分体的实体停留在父层，不做重复登记
//! - 叶节点超过容量阈值时按几何中心懒分裂为 8 个子域
//! - 移动/改变尺寸的实体走 remove + reinsert，而不是原地搬迁
//! - 删除不急于合并空子域（懒合并，留待整树重建）
//!
//! 索引是纯派生状态：NodeHandle + 包围盒缓存，不持有场景数据，
//! 随时可以从 Scene 重建。单帧内写入只发生在 Reindex 阶段，
//! Cull 阶段和外部宽阶段只读，由阶段顺序而非锁来保证。

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::scene::NodeHandle;
use crate::scene::camera::{Containment, Frustum};
use crate::spatial::bounds::BoundingBox;
use crate::spatial::ray::Ray;

/// 八叉树调参（重建触发阈值待实测调优，全部暴露为可调项）
#[derive(Debug, Clone, Copy)]
pub struct OctreeConfig {
    /// 叶节点分裂前可容纳的实体数
    pub capacity: usize,
    /// 最大细分深度，达到后不再分裂
    pub max_depth: u32,
    /// 单帧内移动实体占比超过该值时触发整树重建
    pub rebuild_moved_fraction: f32,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            capacity: 8,
            max_depth: 8,
            rebuild_moved_fraction: 0.5,
        }
    }
}

/// 最近命中结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub entity: NodeHandle,
    pub distance: f32,
}

#[derive(Debug)]
struct OctNode {
    region: BoundingBox,
    depth: u32,
    entities: SmallVec<[NodeHandle; 8]>,
    children: Option<[u32; 8]>,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    node: u32,
    bounds: BoundingBox,
}

const ROOT: u32 = 0;

pub struct Octree {
    config: OctreeConfig,
    nodes: Vec<OctNode>,
    /// 反向查找：实体 → 所在节点 + 包围盒缓存
    entries: FxHashMap<NodeHandle, Entry>,
    moved_this_tick: usize,
}

impl Octree {
    #[must_use]
    pub fn new(region: BoundingBox, config: OctreeConfig) -> Self {
        Self {
            config,
            nodes: vec![OctNode {
                region,
                depth: 0,
                entities: SmallVec::new(),
                children: None,
            }],
            entries: FxHashMap::default(),
            moved_this_tick: 0,
        }
    }

    /// 以默认调参覆盖给定区域
    #[must_use]
    pub fn with_region(region: BoundingBox) -> Self {
        Self::new(region, OctreeConfig::default())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, entity: NodeHandle) -> bool {
        self.entries.contains_key(&entity)
    }

    #[must_use]
    pub fn root_region(&self) -> BoundingBox {
        self.nodes[ROOT as usize].region
    }

    /// 实体当前所在节点的细分深度（调试/测试用）
    #[must_use]
    pub fn depth_of(&self, entity: NodeHandle) -> Option<u32> {
        let entry = self.entries.get(&entity)?;
        Some(self.nodes[entry.node as usize].depth)
    }

    /// 实体缓存的包围盒
    #[must_use]
    pub fn bounds_of(&self, entity: NodeHandle) -> Option<BoundingBox> {
        Some(self.entries.get(&entity)?.bounds)
    }

    pub fn clear(&mut self) {
        let region = self.root_region();
        self.nodes.clear();
        self.nodes.push(OctNode {
            region,
            depth: 0,
            entities: SmallVec::new(),
            children: None,
        });
        self.entries.clear();
        self.moved_this_tick = 0;
    }

    // ========================================================================
    // 写入 (单写者：Reindex 阶段)
    // ========================================================================

    /// 插入实体。已登记的实体等价于 update。
    /// 包围盒越出根域的实体钉在根节点上。
    pub fn insert(&mut self, entity: NodeHandle, bounds: BoundingBox) {
        if self.entries.contains_key(&entity) {
            self.update(entity, bounds);
            return;
        }
        let node = self.place(ROOT, bounds);
        self.nodes[node as usize].entities.push(entity);
        self.entries.insert(entity, Entry { node, bounds });
    }

    /// 摘除实体；不存在时返回 false。不合并空子域。
    pub fn remove(&mut self, entity: NodeHandle) -> bool {
        let Some(entry) = self.entries.remove(&entity) else {
            return false;
        };
        let entities = &mut self.nodes[entry.node as usize].entities;
        if let Some(pos) = entities.iter().position(|&e| e == entity) {
            entities.swap_remove(pos);
        }
        true
    }

    /// 驱逐所有不满足 `keep` 的实体。
    ///
    /// Reindex 用它同步场景里已经直接销毁的节点：
    /// 索引是派生状态，不能比 Scene 活得久。
    pub fn retain(&mut self, mut keep: impl FnMut(NodeHandle) -> bool) {
        let dead: Vec<NodeHandle> = self
            .entries
            .keys()
            .copied()
            .filter(|&entity| !keep(entity))
            .collect();
        for entity in dead {
            self.remove(entity);
        }
    }

    /// 刷新实体的包围盒。
    ///
    /// 新包围盒仍在当前节点域内且节点未超容时原地更新缓存
    /// （短路为 no-op 级别的开销）；否则 remove + reinsert。
    pub fn update(&mut self, entity: NodeHandle, new_bounds: BoundingBox) {
        let Some(entry) = self.entries.get(&entity).copied() else {
            self.insert(entity, new_bounds);
            return;
        };

        if entry.bounds == new_bounds {
            return;
        }
        self.moved_this_tick += 1;

        let node = &self.nodes[entry.node as usize];
        let still_fits = node.region.contains(&new_bounds)
            || (entry.node == ROOT && !node.region.contains(&new_bounds));
        let under_capacity =
            node.children.is_some() || node.entities.len() <= self.config.capacity;

        if still_fits && under_capacity {
            self.entries.insert(
                entity,
                Entry {
                    node: entry.node,
                    bounds: new_bounds,
                },
            );
            return;
        }

        self.remove(entity);
        self.insert(entity, new_bounds);
    }

    /// 找到应容纳 `bounds` 的节点，必要时沿途分裂。
    fn place(&mut self, start: u32, bounds: BoundingBox) -> u32 {
        let mut current = start;
        loop {
            // 叶且未满（或到达深度上限）：就放这里
            if self.nodes[current as usize].children.is_none() {
                let node = &self.nodes[current as usize];
                if node.entities.len() < self.config.capacity || node.depth >= self.config.max_depth
                {
                    return current;
                }
                self.subdivide(current);
            }

            // 找唯一能完全包含的八分体；跨界者留在当前层
            let children = self.nodes[current as usize]
                .children
                .expect("subdivided node has children");
            let mut next = None;
            for &child in &children {
                if self.nodes[child as usize].region.contains(&bounds) {
                    next = Some(child);
                    break;
                }
            }
            match next {
                Some(child) => current = child,
                None => return current,
            }
        }
    }

    /// 在几何中心分裂出 8 个八分体，并把可下沉的实体重新分发一层。
    fn subdivide(&mut self, index: u32) {
        debug_assert!(self.nodes[index as usize].children.is_none());

        let region = self.nodes[index as usize].region;
        let depth = self.nodes[index as usize].depth;

        let mut children = [0u32; 8];
        for (i, slot) in children.iter_mut().enumerate() {
            *slot = self.nodes.len() as u32;
            self.nodes.push(OctNode {
                region: region.octant(i),
                depth: depth + 1,
                entities: SmallVec::new(),
                children: None,
            });
        }
        self.nodes[index as usize].children = Some(children);

        // 重新分发：完全落入某个八分体的实体下沉一层
        let entities = std::mem::take(&mut self.nodes[index as usize].entities);
        for entity in entities {
            let bounds = self.entries[&entity].bounds;
            let mut target = index;
            for &child in &children {
                if self.nodes[child as usize].region.contains(&bounds) {
                    target = child;
                    break;
                }
            }
            self.nodes[target as usize].entities.push(entity);
            self.entries.get_mut(&entity).expect("tracked entity").node = target;
        }
    }

    // ========================================================================
    // 重建策略
    // ========================================================================

    /// 每帧 Reindex 开始时调用，清零移动计数
    pub fn begin_tick(&mut self) {
        self.moved_this_tick = 0;
    }

    /// 本帧移动实体占比是否超过阈值
    #[must_use]
    pub fn needs_rebuild(&self) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let fraction = self.moved_this_tick as f32 / self.entries.len() as f32;
        fraction > self.config.rebuild_moved_fraction
    }

    /// 整树重建：根域按当前包围盒分布重新取齐，全部实体重插。
    ///
    /// 反复的增量 remove/insert 可能让树失衡；重建是 O(n·log n)，
    /// 同时完成懒合并（空子域全部丢弃）。
    pub fn rebuild(&mut self) {
        let all: Vec<(NodeHandle, BoundingBox)> = self
            .entries
            .iter()
            .map(|(&entity, entry)| (entity, entry.bounds))
            .collect();

        let region = if all.is_empty() {
            self.root_region()
        } else {
            let mut union = all[0].1;
            for (_, b) in &all[1..] {
                union = union.union(b);
            }
            // 留出余量，避免边界上的实体反复触发重插
            union.inflate(union.size().max_element() * 0.05 + 1.0)
        };

        self.nodes.clear();
        self.nodes.push(OctNode {
            region,
            depth: 0,
            entities: SmallVec::new(),
            children: None,
        });
        self.entries.clear();

        for (entity, bounds) in all {
            self.insert(entity, bounds);
        }
        self.moved_this_tick = 0;
    }

    // ========================================================================
    // 查询 (只读，可多读者并发)
    // ========================================================================

    /// 视锥查询：Outside 剪枝，Inside 整棵子树免测收取。
    pub fn query_frustum(&self, frustum: &Frustum, out: &mut Vec<NodeHandle>) {
        let mut stack = vec![ROOT];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];

            // 根节点可能钉着越界实体，跳过域测试
            let containment = if index == ROOT {
                Containment::Intersects
            } else {
                frustum.classify_aabb(&node.region)
            };

            match containment {
                Containment::Outside => {}
                Containment::Inside => self.collect_subtree(index, out),
                Containment::Intersects => {
                    for &entity in &node.entities {
                        if frustum.intersects_aabb(&self.entries[&entity].bounds) {
                            out.push(entity);
                        }
                    }
                    if let Some(children) = node.children {
                        stack.extend_from_slice(&children);
                    }
                }
            }
        }
    }

    /// 区域查询：宽阶段碰撞候选集的来源。
    pub fn query_region(&self, volume: &BoundingBox, out: &mut Vec<NodeHandle>) {
        let mut stack = vec![ROOT];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];

            if index != ROOT {
                if !volume.intersects(&node.region) {
                    continue;
                }
                if volume.contains(&node.region) {
                    self.collect_subtree(index, out);
                    continue;
                }
            }

            for &entity in &node.entities {
                if volume.intersects(&self.entries[&entity].bounds) {
                    out.push(entity);
                }
            }
            if let Some(children) = node.children {
                stack.extend_from_slice(&children);
            }
        }
    }

    /// 最近命中射线查询。
    ///
    /// 子域按射线入口距离由近及远访问，入口距离已超过当前最优命中
    /// 的子树整体剪枝；停留在内部节点的跨界实体在下行途中测试，
    /// 因此不会遮蔽更近的叶实体。
    #[must_use]
    pub fn raycast(&self, ray: &Ray) -> Option<RayHit> {
        let mut best: Option<RayHit> = None;
        self.raycast_node(ROOT, ray, &mut best);
        best
    }

    fn raycast_node(&self, index: u32, ray: &Ray, best: &mut Option<RayHit>) {
        let node = &self.nodes[index as usize];

        for &entity in &node.entities {
            if let Some(t) = ray.intersect_aabb(&self.entries[&entity].bounds)
                && best.is_none_or(|b| t < b.distance)
            {
                *best = Some(RayHit {
                    entity,
                    distance: t,
                });
            }
        }

        let Some(children) = node.children else {
            return;
        };

        // 由近及远排序子域
        let mut order: SmallVec<[(f32, u32); 8]> = SmallVec::new();
        for &child in &children {
            if let Some(t) = ray.intersect_aabb(&self.nodes[child as usize].region) {
                order.push((t, child));
            }
        }
        order.sort_by(|a, b| a.0.total_cmp(&b.0));

        for (t_enter, child) in order {
            if best.is_some_and(|b| t_enter > b.distance) {
                break;
            }
            self.raycast_node(child, ray, best);
        }
    }

    fn collect_subtree(&self, index: u32, out: &mut Vec<NodeHandle>) {
        let mut stack = vec![index];
        while let Some(i) = stack.pop() {
            let node = &self.nodes[i as usize];
            out.extend_from_slice(&node.entities);
            if let Some(children) = node.children {
                stack.extend_from_slice(&children);
            }
        }
    }
}
