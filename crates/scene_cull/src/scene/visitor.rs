//! Node visitor trait
//!
//! One method per [`NodeKind`](crate::scene::NodeKind) variant. The defaults
//! just keep walking the children, so a visitor only overrides the kinds it
//! cares about.

use std::cell::RefCell;

use crate::foundation::math::Mat4d;
use crate::partition::DepthPartitionNode;
use crate::scene::{Drawable, NodeId, SceneGraph, TransformNode};

/// Traversal over a [`SceneGraph`]
pub trait NodeVisitor {
    /// Group node
    fn apply_group(&mut self, graph: &SceneGraph, id: NodeId) {
        self.traverse(graph, id);
    }

    /// Transform node
    fn apply_transform(&mut self, graph: &SceneGraph, id: NodeId, _transform: &TransformNode) {
        self.traverse(graph, id);
    }

    /// Projection node
    fn apply_projection(&mut self, graph: &SceneGraph, id: NodeId, _projection: &Mat4d) {
        self.traverse(graph, id);
    }

    /// Geometry container
    fn apply_geode(&mut self, graph: &SceneGraph, id: NodeId, _drawables: &[Drawable]) {
        self.traverse(graph, id);
    }

    /// Depth partition node; only the cull visitor partitions, everyone
    /// else sees a group
    fn apply_depth_partition(
        &mut self,
        graph: &SceneGraph,
        id: NodeId,
        _partition: &RefCell<DepthPartitionNode>,
    ) {
        self.apply_group(graph, id);
    }

    /// Visit every child of `id` in order
    fn traverse(&mut self, graph: &SceneGraph, id: NodeId) {
        for &child in graph.children(id) {
            graph.accept(child, self);
        }
    }
}
