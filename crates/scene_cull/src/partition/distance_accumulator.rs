//! Distance accumulation traversal
//!
//! Walks a subgraph once and records eye-space (near, far) intervals for
//! content that fits a single depth range, descending only into nodes whose
//! own bound spans more than the near/far ratio allows.

use crate::foundation::math::{eye_distance, Mat4d};
use crate::partition::segment_planner::{self, DistancePair};
use crate::scene::{BoundingSphere, Drawable, NodeId, NodeVisitor, Polytope, SceneGraph, TransformNode};

/// Near/far ratio used until one is configured
pub const DEFAULT_NEAR_FAR_RATIO: f64 = 0.0005;

/// Bounding-box corners nearest and farthest along the view direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CornerPair {
    /// Corner index closest to the eye
    pub near: usize,
    /// Corner index farthest from the eye
    pub far: usize,
}

impl CornerPair {
    /// Corner selection for a model-view matrix
    ///
    /// Only the signs of the third row matter, so every box seen through
    /// this matrix can reuse the same pair.
    pub fn from_model_view(model_view: &Mat4d) -> Self {
        let far = usize::from(model_view[(2, 0)] <= 0.0)
            | (usize::from(model_view[(2, 1)] <= 0.0) << 1)
            | (usize::from(model_view[(2, 2)] <= 0.0) << 2);
        Self {
            near: !far & 7,
            far,
        }
    }
}

/// Visitor gathering per-node eye distances for camera segmentation
#[derive(Debug, Clone)]
pub struct DistanceAccumulator {
    model_view: Mat4d,
    projection: Mat4d,
    near_far_ratio: f64,
    max_depth: u32,
    current_depth: u32,

    view_matrices: Vec<Mat4d>,
    projection_matrices: Vec<Mat4d>,
    local_frusta: Vec<Polytope>,
    bb_corners: Vec<CornerPair>,

    distance_pairs: Vec<DistancePair>,
    camera_pairs: Vec<DistancePair>,
    limits: DistancePair,
}

impl DistanceAccumulator {
    /// Accumulator with identity matrices, ready to traverse
    pub fn new() -> Self {
        let mut accumulator = Self {
            model_view: Mat4d::identity(),
            projection: Mat4d::identity(),
            near_far_ratio: DEFAULT_NEAR_FAR_RATIO,
            max_depth: u32::MAX,
            current_depth: 0,
            view_matrices: Vec::new(),
            projection_matrices: Vec::new(),
            local_frusta: Vec::new(),
            bb_corners: Vec::new(),
            distance_pairs: Vec::new(),
            camera_pairs: Vec::new(),
            limits: DistancePair::empty_limits(),
        };
        accumulator.reset();
        accumulator
    }

    /// Root matrices for the next traversal; takes effect on [`reset`](Self::reset)
    pub fn set_matrices(&mut self, model_view: &Mat4d, projection: &Mat4d) {
        self.model_view = *model_view;
        self.projection = *projection;
    }

    /// Set the near/far ratio; values outside (0, 1) are ignored
    pub fn set_near_far_ratio(&mut self, ratio: f64) {
        if !(ratio > 0.0 && ratio < 1.0) {
            log::debug!(
                "Ignoring near/far ratio {} (keeping {})",
                ratio,
                self.near_far_ratio
            );
            return;
        }
        self.near_far_ratio = ratio;
    }

    /// Current near/far ratio
    pub fn near_far_ratio(&self) -> f64 {
        self.near_far_ratio
    }

    /// Nodes at or below this depth are measured as a whole
    pub fn set_max_depth(&mut self, depth: u32) {
        self.max_depth = depth;
    }

    /// Current traversal depth cap
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Clear per-traversal state and seed the stacks from the root matrices
    pub fn reset(&mut self) {
        self.distance_pairs.clear();
        self.camera_pairs.clear();
        self.limits = DistancePair::empty_limits();
        self.current_depth = 0;

        self.view_matrices.clear();
        self.view_matrices.push(self.model_view);

        self.projection_matrices.clear();
        self.projection_matrices.push(self.projection);

        self.local_frusta.clear();
        self.bb_corners.clear();
        self.push_local_frustum();
    }

    /// Pairs recorded by the last traversal
    pub fn distance_pairs(&self) -> &[DistancePair] {
        &self.distance_pairs
    }

    /// Segments from the last [`compute_camera_pairs`](Self::compute_camera_pairs)
    pub fn camera_pairs(&self) -> &[DistancePair] {
        &self.camera_pairs
    }

    /// Running (nearest, farthest) over the recorded pairs
    pub fn limits(&self) -> DistancePair {
        self.limits
    }

    /// Plan camera segments from the recorded pairs
    pub fn compute_camera_pairs(&mut self) -> &[DistancePair] {
        self.camera_pairs = segment_planner::compute_camera_pairs(
            &self.distance_pairs,
            self.limits,
            self.near_far_ratio,
        );
        &self.camera_pairs
    }

    /// Record an eye-space interval
    ///
    /// Intervals entirely behind the eye, or not finite, are dropped. A near
    /// distance at or behind the eye is replaced by `far * ratio`, capped at 1.
    pub fn push_distance_pair(&mut self, z_near: f64, z_far: f64) {
        let Some(pair) = DistancePair::clamped(z_near, z_far, self.near_far_ratio) else {
            return;
        };

        self.distance_pairs.push(pair);
        self.limits.near = self.limits.near.min(pair.near);
        self.limits.far = self.limits.far.max(pair.far);
    }

    /// Decide whether a node needs finer measurement
    ///
    /// Returns false, after recording the node's interval, when the node
    /// fits one depth range or the depth cap is reached. Nodes outside the
    /// side planes of the frustum stop without recording anything.
    pub fn should_continue_traversal(&mut self, bound: &BoundingSphere) -> bool {
        let mut keep_traversing = self.current_depth < self.max_depth;

        if !bound.valid() {
            return keep_traversing;
        }
        if !self.current_frustum().contains_sphere(bound) {
            return false;
        }

        let center_distance = eye_distance(&bound.center, self.current_view());
        let z_near = center_distance - bound.radius;
        let z_far = center_distance + bound.radius;
        if z_near >= z_far * self.near_far_ratio {
            keep_traversing = false;
        }

        if !keep_traversing {
            self.push_distance_pair(z_near, z_far);
        }
        keep_traversing
    }

    fn current_view(&self) -> &Mat4d {
        self.view_matrices.last().unwrap_or(&self.model_view)
    }

    fn current_frustum(&self) -> &Polytope {
        // reset() always leaves one frame on the stack
        &self.local_frusta[self.local_frusta.len() - 1]
    }

    fn current_corners(&self) -> CornerPair {
        self.bb_corners[self.bb_corners.len() - 1]
    }

    fn push_local_frustum(&mut self) {
        let view = *self.current_view();
        let projection = self.projection_matrices.last().copied().unwrap_or(self.projection);

        self.local_frusta
            .push(Polytope::from_matrices(&view, &projection, false, false));
        self.bb_corners.push(CornerPair::from_model_view(&view));
    }

    fn pop_local_frustum(&mut self) {
        self.local_frusta.pop();
        self.bb_corners.pop();
    }

    fn descend(&mut self, graph: &SceneGraph, id: NodeId) {
        self.current_depth += 1;
        self.traverse(graph, id);
        self.current_depth -= 1;
    }
}

impl Default for DistanceAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeVisitor for DistanceAccumulator {
    fn apply_group(&mut self, graph: &SceneGraph, id: NodeId) {
        if self.should_continue_traversal(&graph.bound(id)) {
            self.descend(graph, id);
        }
    }

    fn apply_transform(&mut self, graph: &SceneGraph, id: NodeId, transform: &TransformNode) {
        if !self.should_continue_traversal(&graph.bound(id)) {
            return;
        }

        let mut matrix = *self.current_view();
        let push_matrix = transform.compute_local_to_world(&mut matrix);
        if push_matrix {
            self.view_matrices.push(matrix);
            self.push_local_frustum();
        }

        self.descend(graph, id);

        if push_matrix {
            self.pop_local_frustum();
            self.view_matrices.pop();
        }
    }

    fn apply_projection(&mut self, graph: &SceneGraph, id: NodeId, projection: &Mat4d) {
        if !self.should_continue_traversal(&graph.bound(id)) {
            return;
        }

        self.projection_matrices.push(*projection);
        self.push_local_frustum();

        self.descend(graph, id);

        self.pop_local_frustum();
        self.projection_matrices.pop();
    }

    fn apply_geode(&mut self, graph: &SceneGraph, id: NodeId, drawables: &[Drawable]) {
        // Drawables are only measured individually when the geode as a
        // whole spans too much depth
        if !self.should_continue_traversal(&graph.bound(id)) {
            return;
        }

        let corners = self.current_corners();
        for drawable in drawables {
            let bb = &drawable.bounding_box;
            if !bb.valid() || !self.current_frustum().contains_box(bb) {
                continue;
            }

            let view = self.current_view();
            let mut z_near = eye_distance(&bb.corner(corners.near), view);
            let mut z_far = eye_distance(&bb.corner(corners.far), view);
            if z_near > z_far {
                std::mem::swap(&mut z_near, &mut z_far);
            }
            self.push_distance_pair(z_near, z_far);
        }
    }
}
