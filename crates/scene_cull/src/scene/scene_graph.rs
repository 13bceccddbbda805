//! Arena-backed scene graph
//!
//! Nodes live in a slot map and refer to each other by [`NodeId`]. The graph
//! is a DAG: a node may have several parents (cameras created by a depth
//! partition share its children), but cycles are rejected on insertion.

use std::cell::{Ref, RefCell};

use slotmap::SlotMap;

use crate::foundation::math::Mat4d;
use crate::partition::DepthPartitionNode;
use crate::scene::{
    BoundingBox, BoundingSphere, Drawable, Node, NodeId, NodeKind, NodeVisitor, SceneError,
    SceneResult, TransformNode,
};

/// Owner of every node in a scene
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: SlotMap<NodeId, Node>,
}

impl SceneGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
        }
    }

    /// Insert an unattached node
    pub fn create_node(&mut self, name: impl Into<String>, kind: NodeKind) -> NodeId {
        self.nodes.insert(Node::new(name, kind))
    }

    /// Insert a group node
    pub fn create_group(&mut self, name: impl Into<String>) -> NodeId {
        self.create_node(name, NodeKind::Group)
    }

    /// Insert a transform node
    pub fn create_transform(&mut self, name: impl Into<String>, transform: TransformNode) -> NodeId {
        self.create_node(name, NodeKind::Transform(transform))
    }

    /// Insert a projection node
    pub fn create_projection(&mut self, name: impl Into<String>, projection: Mat4d) -> NodeId {
        self.create_node(name, NodeKind::Projection(projection))
    }

    /// Insert a geometry container
    pub fn create_geode(&mut self, name: impl Into<String>, drawables: Vec<Drawable>) -> NodeId {
        self.create_node(name, NodeKind::Geode(drawables))
    }

    /// Insert a depth partition node
    pub fn create_depth_partition(
        &mut self,
        name: impl Into<String>,
        partition: DepthPartitionNode,
    ) -> NodeId {
        self.create_node(name, NodeKind::DepthPartition(Box::new(RefCell::new(partition))))
    }

    /// Number of nodes in the arena
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Look up a node mutably
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    fn get(&self, id: NodeId) -> SceneResult<&Node> {
        self.nodes.get(id).ok_or(SceneError::NodeNotFound(id))
    }

    /// Children of `id`; empty for unknown ids
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id).map_or(&[], |node| node.children.as_slice())
    }

    /// Borrow the partition payload of a depth partition node
    pub fn depth_partition(&self, id: NodeId) -> Option<Ref<'_, DepthPartitionNode>> {
        match &self.nodes.get(id)?.kind {
            NodeKind::DepthPartition(partition) => partition.try_borrow().ok(),
            _ => None,
        }
    }

    /// Mutably borrow the partition payload of a depth partition node
    pub fn depth_partition_mut(&mut self, id: NodeId) -> Option<&mut DepthPartitionNode> {
        match &mut self.nodes.get_mut(id)?.kind {
            NodeKind::DepthPartition(partition) => Some(partition.get_mut()),
            _ => None,
        }
    }

    /// Dispatch `visitor` on the node's kind
    pub fn accept<V: NodeVisitor + ?Sized>(&self, id: NodeId, visitor: &mut V) {
        let Some(node) = self.nodes.get(id) else {
            log::warn!("Visitor asked to visit missing node {:?}", id);
            return;
        };
        match &node.kind {
            NodeKind::Group => visitor.apply_group(self, id),
            NodeKind::Transform(transform) => visitor.apply_transform(self, id, transform),
            NodeKind::Projection(projection) => visitor.apply_projection(self, id, projection),
            NodeKind::Geode(drawables) => visitor.apply_geode(self, id, drawables),
            NodeKind::DepthPartition(partition) => visitor.apply_depth_partition(self, id, partition),
        }
    }

    // ------------------------------------------------------------------
    // Child management
    // ------------------------------------------------------------------

    /// Append `child` to `parent`
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> SceneResult<()> {
        let index = self.get(parent)?.children.len();
        self.insert_child(parent, index, child)
    }

    /// Insert `child` at `index`; an index past the end appends
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> SceneResult<()> {
        self.get(parent)?;
        self.get(child)?;
        if self.is_ancestor_or_self(child, parent) {
            return Err(SceneError::CycleDetected { parent, child });
        }

        let node = &mut self.nodes[parent];
        let index = index.min(node.children.len());
        node.children.insert(index, child);
        if let NodeKind::DepthPartition(partition) = &mut node.kind {
            partition.get_mut().insert_child_into_cameras(index, child);
        }

        self.nodes[child].parents.push(parent);
        self.dirty_bound(parent);
        Ok(())
    }

    /// Remove `count` children starting at `pos`
    pub fn remove_children(&mut self, parent: NodeId, pos: usize, count: usize) -> SceneResult<()> {
        let len = self.get(parent)?.children.len();
        if pos >= len {
            return Err(SceneError::ChildIndexOutOfRange { index: pos, len });
        }
        let end = (pos + count).min(len);

        let node = &mut self.nodes[parent];
        let removed: Vec<NodeId> = node.children.drain(pos..end).collect();
        if let NodeKind::DepthPartition(partition) = &mut node.kind {
            partition.get_mut().remove_children_from_cameras(pos, end - pos);
        }

        for child in removed {
            self.unlink_parent(child, parent);
        }
        self.dirty_bound(parent);
        Ok(())
    }

    /// Remove a single child by handle
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> SceneResult<()> {
        let pos = self
            .get(parent)?
            .children
            .iter()
            .position(|&c| c == child)
            .ok_or(SceneError::NodeNotFound(child))?;
        self.remove_children(parent, pos, 1)
    }

    /// Replace the child at `index`
    pub fn set_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> SceneResult<()> {
        let len = self.get(parent)?.children.len();
        self.get(child)?;
        if index >= len {
            return Err(SceneError::ChildIndexOutOfRange { index, len });
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(SceneError::CycleDetected { parent, child });
        }

        let node = &mut self.nodes[parent];
        let previous = std::mem::replace(&mut node.children[index], child);
        if let NodeKind::DepthPartition(partition) = &mut node.kind {
            partition.get_mut().set_child_in_cameras(index, child);
        }

        self.unlink_parent(previous, parent);
        self.nodes[child].parents.push(parent);
        self.dirty_bound(parent);
        Ok(())
    }

    /// Append a drawable to a geode
    pub fn add_drawable(&mut self, geode: NodeId, drawable: Drawable) -> SceneResult<()> {
        match &mut self.nodes.get_mut(geode).ok_or(SceneError::NodeNotFound(geode))?.kind {
            NodeKind::Geode(drawables) => drawables.push(drawable),
            other => {
                return Err(SceneError::WrongNodeKind {
                    id: geode,
                    expected: "Geode",
                    found: other.label(),
                })
            }
        }
        self.dirty_bound(geode);
        Ok(())
    }

    /// Replace a transform node's matrix
    pub fn set_transform_matrix(&mut self, id: NodeId, matrix: Mat4d) -> SceneResult<()> {
        match &mut self.nodes.get_mut(id).ok_or(SceneError::NodeNotFound(id))?.kind {
            NodeKind::Transform(transform) => transform.matrix = matrix,
            other => {
                return Err(SceneError::WrongNodeKind {
                    id,
                    expected: "Transform",
                    found: other.label(),
                })
            }
        }
        self.dirty_bound(id);
        Ok(())
    }

    fn unlink_parent(&mut self, child: NodeId, parent: NodeId) {
        if let Some(node) = self.nodes.get_mut(child) {
            if let Some(i) = node.parents.iter().position(|&p| p == parent) {
                node.parents.swap_remove(i);
            }
        }
    }

    /// True when `candidate` is `node` or one of its ancestors
    fn is_ancestor_or_self(&self, candidate: NodeId, node: NodeId) -> bool {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if current == candidate {
                return true;
            }
            if let Some(n) = self.nodes.get(current) {
                stack.extend_from_slice(&n.parents);
            }
        }
        false
    }

    // ------------------------------------------------------------------
    // Bounds
    // ------------------------------------------------------------------

    /// Drop memoised bounds for `id` and everything above it
    ///
    /// A stale node always has stale ancestors, so the walk stops at the
    /// first node that is already stale.
    pub fn dirty_bound(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(current) {
                if node.cached_bound.take().is_some() || current == id {
                    stack.extend_from_slice(&node.parents);
                }
            }
        }
    }

    /// Bounding sphere of `id` in its parent's space
    ///
    /// Uses the memoised value when fresh, otherwise computes it without
    /// storing anything; call [`refresh_bounds`](Self::refresh_bounds) to
    /// memoise.
    pub fn bound(&self, id: NodeId) -> BoundingSphere {
        match self.nodes.get(id) {
            Some(node) => node.cached_bound.unwrap_or_else(|| self.compute_bound(node)),
            None => BoundingSphere::invalid(),
        }
    }

    /// Recompute and memoise every stale bound
    pub fn refresh_bounds(&mut self) {
        let ids: Vec<NodeId> = self.nodes.keys().collect();
        for id in ids {
            self.refresh_bound(id);
        }
    }

    fn refresh_bound(&mut self, id: NodeId) -> BoundingSphere {
        let Some(node) = self.nodes.get(id) else {
            return BoundingSphere::invalid();
        };
        if let Some(bound) = node.cached_bound {
            return bound;
        }
        let children = node.children.clone();
        for child in children {
            self.refresh_bound(child);
        }
        let bound = self.bound(id);
        self.nodes[id].cached_bound = Some(bound);
        bound
    }

    fn compute_bound(&self, node: &Node) -> BoundingSphere {
        match &node.kind {
            NodeKind::Geode(drawables) => {
                let mut bb = BoundingBox::empty();
                for drawable in drawables {
                    bb.expand_by_box(&drawable.bounding_box);
                }
                BoundingSphere::from_box(&bb)
            }
            NodeKind::Transform(transform) => {
                transform.transform_bound(&self.group_bound(&node.children))
            }
            NodeKind::Group | NodeKind::Projection(_) | NodeKind::DepthPartition(_) => {
                self.group_bound(&node.children)
            }
        }
    }

    fn group_bound(&self, children: &[NodeId]) -> BoundingSphere {
        let child_bounds: Vec<BoundingSphere> = children.iter().map(|&c| self.bound(c)).collect();

        let mut bb = BoundingBox::empty();
        for bound in &child_bounds {
            bb.expand_by_sphere(bound);
        }
        if !bb.valid() {
            return BoundingSphere::invalid();
        }

        let mut sphere = BoundingSphere::new(bb.center(), 0.0);
        for bound in &child_bounds {
            sphere.expand_radius_by(bound);
        }
        sphere
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3d;
    use crate::scene::DrawableId;
    use approx::assert_relative_eq;

    fn unit_drawable(id: u64, center: Vec3d) -> Drawable {
        Drawable::new(
            DrawableId(id),
            BoundingBox::from_center_extents(center, Vec3d::repeat(1.0)),
        )
    }

    #[test]
    fn test_add_and_remove_children() {
        let mut graph = SceneGraph::new();
        let root = graph.create_group("root");
        let a = graph.create_group("a");
        let b = graph.create_group("b");

        graph.add_child(root, a).unwrap();
        graph.add_child(root, b).unwrap();
        assert_eq!(graph.children(root), &[a, b]);
        assert_eq!(graph.node(a).unwrap().parents(), &[root]);

        graph.remove_children(root, 0, 1).unwrap();
        assert_eq!(graph.children(root), &[b]);
        assert!(graph.node(a).unwrap().parents().is_empty());
    }

    #[test]
    fn test_insert_and_set_child() {
        let mut graph = SceneGraph::new();
        let root = graph.create_group("root");
        let a = graph.create_group("a");
        let b = graph.create_group("b");
        let c = graph.create_group("c");

        graph.add_child(root, a).unwrap();
        graph.insert_child(root, 0, b).unwrap();
        assert_eq!(graph.children(root), &[b, a]);

        graph.set_child(root, 1, c).unwrap();
        assert_eq!(graph.children(root), &[b, c]);
        assert!(graph.node(a).unwrap().parents().is_empty());

        let err = graph.set_child(root, 5, a).unwrap_err();
        assert!(matches!(err, SceneError::ChildIndexOutOfRange { index: 5, len: 2 }));
    }

    #[test]
    fn test_cycles_are_rejected() {
        let mut graph = SceneGraph::new();
        let root = graph.create_group("root");
        let child = graph.create_group("child");
        graph.add_child(root, child).unwrap();

        assert!(matches!(
            graph.add_child(child, root),
            Err(SceneError::CycleDetected { .. })
        ));
        assert!(matches!(
            graph.add_child(root, root),
            Err(SceneError::CycleDetected { .. })
        ));
    }

    #[test]
    fn test_group_bound_encloses_children() {
        let mut graph = SceneGraph::new();
        let root = graph.create_group("root");
        let left = graph.create_geode("left", vec![unit_drawable(1, Vec3d::new(-10.0, 0.0, 0.0))]);
        let right = graph.create_geode("right", vec![unit_drawable(2, Vec3d::new(10.0, 0.0, 0.0))]);
        graph.add_child(root, left).unwrap();
        graph.add_child(root, right).unwrap();

        let bound = graph.bound(root);
        assert_relative_eq!(bound.center, Vec3d::zeros(), epsilon = 1e-12);
        assert_relative_eq!(bound.radius, 10.0 + 3f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_bounds_memoise_and_invalidate() {
        let mut graph = SceneGraph::new();
        let root = graph.create_group("root");
        let xform = graph.create_transform(
            "xform",
            TransformNode::new(Mat4d::new_translation(&Vec3d::new(0.0, 0.0, -50.0))),
        );
        let geode = graph.create_geode("geode", vec![unit_drawable(1, Vec3d::zeros())]);
        graph.add_child(root, xform).unwrap();
        graph.add_child(xform, geode).unwrap();

        graph.refresh_bounds();
        assert!(!graph.node(root).unwrap().is_bound_stale());
        assert_relative_eq!(graph.bound(root).center.z, -50.0, epsilon = 1e-12);

        graph
            .set_transform_matrix(xform, Mat4d::new_translation(&Vec3d::new(0.0, 0.0, -80.0)))
            .unwrap();
        assert!(graph.node(root).unwrap().is_bound_stale());
        assert_relative_eq!(graph.bound(root).center.z, -80.0, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_group_has_invalid_bound() {
        let mut graph = SceneGraph::new();
        let root = graph.create_group("root");
        assert!(!graph.bound(root).valid());
    }
}
