//! Deferred Scene Mutations
//!
//! Mutations issued by external callers (gameplay logic, GUI) during a tick
//! are not applied immediately: they are enqueued here and drained atomically
//! at the top of the next Ingest phase. This keeps traversals free of
//! iterator invalidation and gives mutation a single well-defined
//! application point per frame.
//!
//! The queue is an explicit data structure rather than an incidental
//! call-order guarantee, so tests can assert on queued-vs-applied state
//! directly.

use std::sync::Arc;

use glam::{Quat, Vec3};
use parking_lot::Mutex;

use crate::scene::node::Node;
use crate::scene::NodeHandle;

/// A scene mutation deferred to the next Ingest phase.
///
/// Commands are applied in enqueue order. Individual failures (stale
/// handles, structural rejections) are logged and counted by the scheduler;
/// they never abort the tick.
#[derive(Debug)]
pub enum SceneCommand {
    /// Create a node, optionally under a parent.
    AddNode {
        parent: Option<NodeHandle>,
        node: Box<Node>,
    },
    /// Recursively destroy a subtree.
    RemoveNode { handle: NodeHandle },
    /// Re-link a node; `keep_world` preserves the world pose.
    Reparent {
        handle: NodeHandle,
        new_parent: Option<NodeHandle>,
        keep_world: bool,
    },
    /// Replace a node's local TRS.
    SetLocalTransform {
        handle: NodeHandle,
        position: Vec3,
        rotation: Quat,
        scale: Vec3,
    },
    /// Switch the active camera node.
    SetActiveCamera { handle: NodeHandle },
    /// Toggle culling/emission participation.
    SetVisible { handle: NodeHandle, visible: bool },
}

/// Cloneable handle to the shared mutation inbox.
///
/// `push` may be called from any thread at any time; `drain` is called only
/// by the scheduler at Ingest.
#[derive(Debug, Clone, Default)]
pub struct CommandQueue {
    inner: Arc<Mutex<Vec<SceneCommand>>>,
}

impl CommandQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, command: SceneCommand) {
        self.inner.lock().push(command);
    }

    /// Number of commands waiting for the next Ingest.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.lock().len()
    }

    /// Takes all queued commands, leaving the queue empty.
    #[must_use]
    pub fn drain(&self) -> Vec<SceneCommand> {
        std::mem::take(&mut *self.inner.lock())
    }
}
