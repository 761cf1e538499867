//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! The main error type [`RigError`] covers every failure mode of an
//! extraction run:
//! - Lookups against nodes that are no longer in the scene
//! - Transforms with zero or several result shapes where one was required
//! - Mutations refused by the scene service (locked nodes, shape re-parenting)
//! - Misaligned source/target lists when strict alignment is requested
//! - Scene description and settings parsing errors
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for `std::result::Result<T, RigError>`.
//!
//! ```rust,ignore
//! use rigkit::errors::{RigError, Result};
//!
//! fn extract() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::scene::{Channel, NodeHandle, NodeKind};

/// The main error type for rig extraction.
///
/// Only [`RigError::PruneConflict`] is treated as recoverable by the
/// extraction pipeline; every other variant aborts the current operation.
#[derive(Error, Debug)]
pub enum RigError {
    // ========================================================================
    // Query Errors
    // ========================================================================
    /// The node is not (or no longer) part of the scene.
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeHandle),

    /// A transform has zero or several result shapes where exactly one was required.
    #[error("Expected exactly one result shape under '{transform}', found {count}")]
    AmbiguousShape {
        /// Full path of the transform
        transform: String,
        /// Number of result shapes found
        count: usize,
    },

    /// The node has a different type than the operation requires.
    #[error("'{node}' is a {found:?} node, expected {expected}")]
    UnexpectedKind {
        /// Full path of the node
        node: String,
        /// Human readable description of the accepted kinds
        expected: &'static str,
        /// The actual kind
        found: NodeKind,
    },

    /// A mesh expected to be skinned has no skin cluster attached.
    #[error("No skin cluster drives '{0}'")]
    NoSkinCluster(String),

    /// A skin cluster was requested without any influence joint.
    #[error("Cannot bind '{0}': the influence set is empty")]
    EmptyInfluenceSet(String),

    // ========================================================================
    // Mutation Errors
    // ========================================================================
    /// The scene refused to delete or re-parent a node.
    #[error("Scene refused to modify '{node}': {reason}")]
    PruneConflict {
        /// Full path of the node
        node: String,
        /// Why the scene refused
        reason: String,
    },

    /// A transform channel is locked and cannot be modified.
    #[error("Channel {channel:?} is locked on '{node}'")]
    LockedChannel {
        /// Full path of the node
        node: String,
        /// The locked channel(s)
        channel: Channel,
    },

    /// A name is not usable for a scene node.
    #[error("Invalid node name: {0:?}")]
    InvalidName(String),

    // ========================================================================
    // Weight Transfer Errors
    // ========================================================================
    /// Source and target mesh lists are not position-aligned.
    #[error("Source/target mismatch: {sources} sources, {targets} targets")]
    AlignmentMismatch {
        /// Number of source meshes
        sources: usize,
        /// Number of target meshes
        targets: usize,
    },

    /// Mesh data or weight table is malformed.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A pipeline stage ran before the stage it depends on.
    #[error("{stage} requires {requires} to run first")]
    StageOrder {
        /// The stage that was called
        stage: &'static str,
        /// The missing earlier stage
        requires: &'static str,
    },

    // ========================================================================
    // Format & I/O Errors
    // ========================================================================
    /// Scene description references unknown or duplicated names.
    #[error("Invalid scene description: {0}")]
    InvalidDescription(String),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl RigError {
    /// Returns `true` for errors the pipeline logs and skips instead of aborting.
    #[inline]
    #[must_use]
    pub fn is_prune_conflict(&self) -> bool {
        matches!(self, RigError::PruneConflict { .. })
    }
}

/// Alias for `Result<T, RigError>`.
pub type Result<T> = std::result::Result<T, RigError>;
