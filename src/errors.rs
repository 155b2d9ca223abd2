//! Error Types
//!
//! This module defines the error types used throughout the engine core.
//!
//! # Overview
//!
//! The main error type [`FableError`] covers all recoverable failure modes:
//! - Structural scene-graph violations (unknown parent, cycles)
//! - Stale node or entity handles
//! - Unresolved asset handles
//! - A missing active camera
//!
//! Nothing in this core is process-fatal. The frame scheduler degrades a
//! single tick's output (skipping Cull/Emit, or skipping one node) rather
//! than aborting the tick loop; structural mutations are rejected with the
//! scene left unchanged.
//!
//! # Usage
//!
//! All fallible public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, FableError>`.

use thiserror::Error;

use crate::scene::NodeHandle;

/// The main error type for the engine core.
///
/// Each variant provides specific context about what went wrong. See the
/// module documentation for the propagation policy.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FableError {
    // ========================================================================
    // Scene Graph Errors
    // ========================================================================
    /// An operation referenced a node that does not (or no longer) exist.
    ///
    /// This is recoverable and usually a caller bug (a stale handle kept
    /// across a `remove`). Logged and ignored by the scheduler.
    #[error("Node not found: {0:?}")]
    NotFound(NodeHandle),

    /// `add_node` referenced a parent that does not resolve.
    #[error("Invalid parent node: {0:?}")]
    InvalidParent(NodeHandle),

    /// A reparent would make a node its own ancestor.
    ///
    /// The mutation is rejected and the scene is left unchanged.
    #[error("Reparenting {child:?} under {parent:?} would create a cycle")]
    CycleDetected {
        /// The node being reparented
        child: NodeHandle,
        /// The requested new parent (a descendant of `child`)
        parent: NodeHandle,
    },

    // ========================================================================
    // Asset Errors
    // ========================================================================
    /// A component references an asset handle that never resolved.
    ///
    /// The node is skipped for the current tick; the engine continues.
    #[error("Unresolved {what} handle on node {node:?}")]
    UnresolvedHandle {
        /// The node carrying the dangling component
        node: NodeHandle,
        /// Which handle failed to resolve ("mesh", "material", ...)
        what: &'static str,
    },

    // ========================================================================
    // Frame Errors
    // ========================================================================
    /// No active camera was available for the tick.
    ///
    /// Cull and Emit are skipped for the tick; no draw list is produced,
    /// but the engine keeps running.
    #[error("No active camera for this tick")]
    MissingCamera,
}

/// Alias for `Result<T, FableError>`.
pub type Result<T> = std::result::Result<T, FableError>;
