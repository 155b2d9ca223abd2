//! 空间索引模块
//!
//! 在场景实体的世界空间包围盒之上维护一棵八叉树，
//! 为视锥剔除、宽阶段碰撞候选和射线拾取提供次线性查询。
//! 索引只保存派生状态，随时可以从 Scene 重建。

pub mod bounds;
pub mod octree;
pub mod ray;

pub use bounds::BoundingBox;
pub use octree::{Octree, OctreeConfig, RayHit};
pub use ray::Ray;
