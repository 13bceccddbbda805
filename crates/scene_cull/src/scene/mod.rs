//! Scene graph collaborator
//!
//! Provides the node arena, bounding volumes and frustum tests that the
//! cull pipeline queries.
//!
//! ## Architecture
//!
//! ```text
//! SceneGraph (SlotMap<NodeId, Node>)
//!      ↓ accept()
//! NodeVisitor (DistanceAccumulator, CullVisitor, ...)
//! ```
//!
//! Node kinds form a closed enum; visitors implement one method per kind.

mod bounds;
mod frustum;
mod node;
mod scene_graph;
mod visitor;

pub use bounds::{BoundingBox, BoundingSphere};
pub use frustum::{Plane, Polytope};
pub use node::{
    Drawable, DrawableId, Node, NodeId, NodeKind, ReferenceFrame, RenderBinDetails, RenderingHint,
    StateSet, TransformNode,
};
pub use scene_graph::SceneGraph;
pub use visitor::NodeVisitor;

use thiserror::Error;

/// Scene editing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// Handle does not refer to a live node
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Child index outside the child list
    #[error("Child index {index} out of range (node has {len} children)")]
    ChildIndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of children
        len: usize,
    },

    /// The edit would make a node its own ancestor
    #[error("Adding {child:?} under {parent:?} would create a cycle")]
    CycleDetected {
        /// Node receiving the child
        parent: NodeId,
        /// Node being attached
        child: NodeId,
    },

    /// Operation needs a different kind of node
    #[error("Node {id:?} is a {found}, expected a {expected}")]
    WrongNodeKind {
        /// Offending node
        id: NodeId,
        /// Kind the operation needs
        expected: &'static str,
        /// Kind the node has
        found: &'static str,
    },
}

/// Result type for scene editing
pub type SceneResult<T> = Result<T, SceneError>;
