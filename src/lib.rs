#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod assets;
pub mod engine;
pub mod errors;
pub mod frame;
pub mod scene;
pub mod spatial;

pub use assets::{AssetServer, MaterialHandle, MeshHandle};
pub use engine::{CameraInput, CameraState, Engine, TransformListener, ViewportState};
pub use errors::{FableError, Result};
pub use frame::command::{CommandQueue, SceneCommand};
pub use frame::render_queue::{NullBackend, RenderBackend, RenderItem, RenderQueue};
pub use frame::scheduler::{FramePhase, FrameReport, FrameScheduler, SchedulerConfig};
pub use scene::camera::{Camera, Containment, Frustum, ProjectionType};
pub use scene::light::{Light, LightKind};
pub use scene::node::{Collider, ColliderShape, MeshRenderer, Node, NodeFlags};
pub use scene::transform::Transform;
pub use scene::{NodeHandle, Scene};
pub use spatial::bounds::BoundingBox;
pub use spatial::octree::{Octree, OctreeConfig, RayHit};
pub use spatial::ray::Ray;
