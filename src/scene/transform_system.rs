//! 变换系统 (Transform System)
//!
//! 负责场景图的矩阵层级更新，与 Scene 解耦以避免借用冲突。
//! 这是一个独立的系统，只需要借用 nodes SlotMap、相机池和 root_nodes 列表。
//!
//! 自顶向下单遍完成：父节点的世界矩阵总是先于子节点定稿，
//! 本遍中已经干净的节点不会被重算。层级深度只在这里产生代价。
//!
//! 世界矩阵实际变化的节点句柄会被收集到 `moved`，
//! 调度器的 Reindex 阶段据此增量刷新空间索引。

use glam::Affine3A;
use slotmap::SlotMap;

use crate::scene::camera::Camera;
use crate::scene::node::Node;
use crate::scene::{CameraKey, NodeHandle};

/// 更新整个场景层级的世界矩阵（迭代版本）
///
/// 使用显式栈替代递归调用，避免深层级场景的栈溢出风险，
/// 同时减少重复借用开销。挂有相机组件的节点移动时，
/// 其视图投影矩阵在同一遍中同步刷新。
pub fn update_hierarchy_iterative(
    nodes: &mut SlotMap<NodeHandle, Node>,
    cameras: &mut SlotMap<CameraKey, Camera>,
    roots: &[NodeHandle],
    moved: &mut Vec<NodeHandle>,
) {
    // 工作栈：(节点句柄, 父世界矩阵, 父是否变化)
    let mut stack: Vec<(NodeHandle, Affine3A, bool)> = Vec::with_capacity(64);

    // 初始化：所有根节点入栈
    for &root in roots.iter().rev() {
        stack.push((root, Affine3A::IDENTITY, false));
    }

    while let Some((handle, parent_world, parent_changed)) = stack.pop() {
        let Some(node) = nodes.get_mut(handle) else {
            continue;
        };

        // 1. 更新局部矩阵（影子状态脏检查）
        let local_changed = node.transform.update_local_matrix();
        let world_needs_update = local_changed || parent_changed;

        // 2. 更新世界矩阵
        if world_needs_update {
            let new_world = parent_world * *node.transform.local_matrix();
            node.transform.set_world_matrix(new_world);
            moved.push(handle);

            // 同步更新相机
            if let Some(camera_key) = node.camera_key()
                && let Some(camera) = cameras.get_mut(camera_key)
            {
                camera.update_view_projection(&new_world);
            }
        }

        // 3. 将子节点压入栈（逆序以保持处理顺序）
        let current_world = node.transform.world_matrix;
        let children_count = node.children.len();
        for i in (0..children_count).rev() {
            if let Some(node) = nodes.get(handle)
                && let Some(&child) = node.children.get(i)
            {
                stack.push((child, current_world, world_needs_update));
            }
        }
    }
}

/// 从指定节点开始向下强制刷新子树。
///
/// 用于局部更新场景图的一部分；父节点的世界矩阵取其缓存值。
pub fn update_subtree(
    nodes: &mut SlotMap<NodeHandle, Node>,
    cameras: &mut SlotMap<CameraKey, Camera>,
    root: NodeHandle,
    moved: &mut Vec<NodeHandle>,
) {
    let parent_world = if let Some(node) = nodes.get(root) {
        if let Some(parent) = node.parent {
            nodes
                .get(parent)
                .map_or(Affine3A::IDENTITY, |p| p.transform.world_matrix)
        } else {
            Affine3A::IDENTITY
        }
    } else {
        return;
    };

    let mut stack: Vec<(NodeHandle, Affine3A, bool)> = vec![(root, parent_world, true)];

    while let Some((handle, parent_world, parent_changed)) = stack.pop() {
        let Some(node) = nodes.get_mut(handle) else {
            continue;
        };

        let local_changed = node.transform.update_local_matrix();
        let world_needs_update = local_changed || parent_changed;

        if world_needs_update {
            let new_world = parent_world * *node.transform.local_matrix();
            node.transform.set_world_matrix(new_world);
            moved.push(handle);

            if let Some(camera_key) = node.camera_key()
                && let Some(camera) = cameras.get_mut(camera_key)
            {
                camera.update_view_projection(&new_world);
            }
        }

        let current_world = node.transform.world_matrix;
        let children_count = node.children.len();
        for i in (0..children_count).rev() {
            if let Some(node) = nodes.get(handle)
                && let Some(&child) = node.children.get(i)
            {
                stack.push((child, current_world, world_needs_update));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_hierarchy_update() {
        let mut nodes: SlotMap<NodeHandle, Node> = SlotMap::with_key();
        let mut cameras: SlotMap<CameraKey, Camera> = SlotMap::with_key();

        // 创建简单的父子层级
        let mut parent = Node::new("parent");
        parent.transform.position = Vec3::new(1.0, 0.0, 0.0);
        let parent_handle = nodes.insert(parent);

        let mut child = Node::new("child");
        child.transform.position = Vec3::new(0.0, 1.0, 0.0);
        child.parent = Some(parent_handle);
        let child_handle = nodes.insert(child);

        // 建立父子关系
        nodes
            .get_mut(parent_handle)
            .unwrap()
            .children
            .push(child_handle);

        let roots = vec![parent_handle];
        let mut moved = Vec::new();

        // 执行更新
        update_hierarchy_iterative(&mut nodes, &mut cameras, &roots, &mut moved);

        // 验证子节点的世界位置
        let child_world_pos = nodes
            .get(child_handle)
            .unwrap()
            .transform
            .world_matrix
            .translation;
        assert!((child_world_pos.x - 1.0).abs() < 1e-5);
        assert!((child_world_pos.y - 1.0).abs() < 1e-5);
        assert_eq!(moved.len(), 2);

        // 幂等：无变动时第二遍不产生 moved
        moved.clear();
        update_hierarchy_iterative(&mut nodes, &mut cameras, &roots, &mut moved);
        assert!(moved.is_empty());
    }
}
