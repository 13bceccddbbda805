//! Depth partition node
//!
//! During cull the node measures its children with a
//! [`DistanceAccumulator`], plans depth segments and culls its children once
//! per segment through a dedicated [`Camera`]. Cameras are kept between
//! frames and reused by slot index.

use crate::config::PartitionConfig;
use crate::foundation::math::Mat4d;
use crate::partition::camera::{Camera, ClearMask, RenderOrder};
use crate::partition::distance_accumulator::DistanceAccumulator;
use crate::render::CullVisitor;
use crate::scene::{NodeId, NodeVisitor, SceneGraph};

/// Scene node that renders its subgraph through several depth-clamped cameras
#[derive(Debug)]
pub struct DepthPartitionNode {
    active: bool,
    clear_color_buffer: bool,
    render_order: RenderOrder,
    near_far_ratio: Option<f64>,
    distance_accumulator: DistanceAccumulator,
    cameras: Vec<Option<Camera>>,
}

impl DepthPartitionNode {
    /// Active node drawing after the enclosing stage, clearing color in
    /// the farthest segment
    pub fn new() -> Self {
        Self {
            active: true,
            clear_color_buffer: true,
            render_order: RenderOrder::PostRender,
            near_far_ratio: None,
            distance_accumulator: DistanceAccumulator::new(),
            cameras: Vec::new(),
        }
    }

    /// Node configured from a [`PartitionConfig`]
    pub fn from_config(config: &PartitionConfig) -> Self {
        let mut node = Self::new();
        node.apply_config(config);
        node
    }

    /// Apply every option in `config`
    pub fn apply_config(&mut self, config: &PartitionConfig) {
        self.set_active(config.active);
        self.set_clear_color_buffer(config.clear_color_buffer);
        self.set_render_order(config.render_order);
        self.set_max_traversal_depth(config.max_traversal_depth);
        match config.near_far_ratio {
            Some(ratio) if !(ratio > 0.0 && ratio < 1.0) => {
                log::warn!("Ignoring near/far ratio {} outside (0, 1)", ratio);
            }
            other => self.near_far_ratio = other,
        }
    }

    /// When inactive the node is traversed like a plain group
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Whether partitioning is enabled
    pub fn active(&self) -> bool {
        self.active
    }

    /// Whether the farthest segment clears the color buffer too
    pub fn set_clear_color_buffer(&mut self, clear: bool) {
        self.clear_color_buffer = clear;

        if let Some(Some(first)) = self.cameras.first_mut() {
            first.clear_mask = Self::clear_mask_for(0, clear);
        }
    }

    /// Color clearing flag for the farthest segment
    pub fn clear_color_buffer(&self) -> bool {
        self.clear_color_buffer
    }

    /// Render order for every existing and future camera
    pub fn set_render_order(&mut self, order: RenderOrder) {
        self.render_order = order;
        for camera in self.cameras.iter_mut().flatten() {
            camera.render_order = order;
        }
    }

    /// Render order given to cameras
    pub fn render_order(&self) -> RenderOrder {
        self.render_order
    }

    /// Depth cap for distance measurement
    pub fn set_max_traversal_depth(&mut self, depth: u32) {
        self.distance_accumulator.set_max_depth(depth);
    }

    /// Current depth cap
    pub fn max_traversal_depth(&self) -> u32 {
        self.distance_accumulator.max_depth()
    }

    /// Use a fixed near/far ratio instead of the cull settings' one
    ///
    /// Values outside (0, 1) are ignored.
    pub fn set_near_far_ratio(&mut self, ratio: f64) {
        if ratio > 0.0 && ratio < 1.0 {
            self.near_far_ratio = Some(ratio);
        } else {
            log::warn!("Ignoring near/far ratio {} outside (0, 1)", ratio);
        }
    }

    /// Go back to the cull settings' near/far ratio
    pub fn clear_near_far_ratio(&mut self) {
        self.near_far_ratio = None;
    }

    /// Fixed near/far ratio, if any
    pub fn near_far_ratio(&self) -> Option<f64> {
        self.near_far_ratio
    }

    /// Accumulator state from the last cull
    pub fn distance_accumulator(&self) -> &DistanceAccumulator {
        &self.distance_accumulator
    }

    /// Number of camera slots, used or not
    pub fn num_cameras(&self) -> usize {
        self.cameras.len()
    }

    /// Camera in slot `index`
    pub fn camera(&self, index: usize) -> Option<&Camera> {
        self.cameras.get(index).and_then(Option::as_ref)
    }

    /// Every existing camera in slot order
    pub fn cameras(&self) -> impl Iterator<Item = &Camera> {
        self.cameras.iter().flatten()
    }

    fn clear_mask_for(index: usize, clear_color_buffer: bool) -> ClearMask {
        if index == 0 && clear_color_buffer {
            ClearMask::COLOR | ClearMask::DEPTH
        } else {
            ClearMask::DEPTH
        }
    }

    /// Camera for segment `index`, created on first use
    ///
    /// New cameras take a copy of `children`. Every call rewrites the
    /// projection to `projection` clamped to (near, far).
    pub fn create_or_reuse_camera(
        &mut self,
        projection: &Mat4d,
        z_near: f64,
        z_far: f64,
        index: usize,
        children: &[NodeId],
    ) -> &mut Camera {
        if index >= self.cameras.len() {
            self.cameras.resize_with(index + 1, || None);
        }

        let render_order = self.render_order;
        let clear_mask = Self::clear_mask_for(index, self.clear_color_buffer);
        let camera = self.cameras[index].get_or_insert_with(|| {
            log::debug!("Creating depth partition camera for segment {}", index);
            Camera::for_segment(render_order, clear_mask, children.to_vec())
        });

        camera.set_clamped_projection(projection, z_near, z_far);
        camera
    }

    /// Partitioned cull of the node `id`
    ///
    /// Falls back to plain traversal when inactive or childless.
    pub fn cull(&mut self, cv: &mut CullVisitor<'_>, graph: &SceneGraph, id: NodeId) {
        let children = graph.children(id);
        if !self.active || children.is_empty() {
            cv.traverse(graph, id);
            return;
        }

        let model_view = cv.model_view();
        let projection = cv.projection();
        let viewport = cv.viewport();

        self.distance_accumulator.set_matrices(&model_view, &projection);
        self.distance_accumulator
            .set_near_far_ratio(self.near_far_ratio.unwrap_or(cv.settings().near_far_ratio));
        self.distance_accumulator.reset();

        for &child in children {
            graph.accept(child, &mut self.distance_accumulator);
        }

        let segments = self.distance_accumulator.compute_camera_pairs().to_vec();
        log::trace!("Depth partition segments (far to near): {:?}", segments);

        for (index, segment) in segments.iter().enumerate() {
            let camera =
                self.create_or_reuse_camera(&projection, segment.near, segment.far, index, children);
            camera.view = model_view;
            camera.viewport = viewport;
            cv.apply_camera(graph, camera);
        }

        if !segments.is_empty() {
            if let Some(Some(first)) = self.cameras.first_mut() {
                first.clear_color = cv.render_stage_clear_color();
            }
        }
    }

    pub(crate) fn insert_child_into_cameras(&mut self, index: usize, child: NodeId) {
        for camera in self.cameras.iter_mut().flatten() {
            camera.insert_child(index, child);
        }
    }

    pub(crate) fn remove_children_from_cameras(&mut self, pos: usize, count: usize) {
        for camera in self.cameras.iter_mut().flatten() {
            camera.remove_children(pos, count);
        }
    }

    pub(crate) fn set_child_in_cameras(&mut self, index: usize, child: NodeId) {
        for camera in self.cameras.iter_mut().flatten() {
            camera.set_child(index, child);
        }
    }
}

impl Default for DepthPartitionNode {
    fn default() -> Self {
        Self::new()
    }
}
