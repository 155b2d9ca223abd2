use glam::Vec3;

use crate::spatial::bounds::BoundingBox;

/// 世界空间射线
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    /// 单位方向（构造时归一化）
    pub direction: Vec3,
    pub max_distance: f32,
}

impl Ray {
    #[must_use]
    pub fn new(origin: Vec3, direction: Vec3, max_distance: f32) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
            max_distance,
        }
    }

    /// Slab 法求与 AABB 的相交入口距离。
    ///
    /// 返回进入距离 t（射线原点在盒内时为 0）；
    /// 不相交或超出 `max_distance` 时为 None。
    #[must_use]
    pub fn intersect_aabb(&self, aabb: &BoundingBox) -> Option<f32> {
        let inv = self.direction.recip();

        let t1 = (aabb.min - self.origin) * inv;
        let t2 = (aabb.max - self.origin) * inv;

        let t_min = t1.min(t2);
        let t_max = t1.max(t2);

        let t_enter = t_min.max_element();
        let t_exit = t_max.min_element();

        // 除零产生的 ±inf 在 min/max 归约中自然消解；
        // NaN (原点分量恰好在面上且方向分量为 0) 比较恒为 false，按不相交处理
        if t_enter <= t_exit && t_exit >= 0.0 && t_enter <= self.max_distance {
            Some(t_enter.max(0.0))
        } else {
            None
        }
    }

    #[must_use]
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}
