//! Cull traversal
//!
//! Walks the scene with matrix, viewport and frustum stacks, rejects
//! content outside the view frustum and turns visible drawables into
//! [`RenderLeaf`]s inside the current [`RenderStage`]. Cameras met along
//! the way (from depth partition nodes) get their own child stage.

use std::cell::RefCell;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::foundation::math::{self, eye_distance, Mat4d, Vec4d};
use crate::partition::{
    clamp_projection, Camera, ClearMask, ComputeNearFarMode, CornerPair, CullingMode,
    DepthPartitionNode, RenderOrder, Viewport, DEFAULT_NEAR_FAR_RATIO,
};
use crate::render::{RenderBinRegistry, RenderLeaf, RenderStage};
use crate::scene::{
    BoundingBox, BoundingSphere, Drawable, NodeId, NodeVisitor, Polytope, ReferenceFrame,
    RenderingHint, SceneGraph, TransformNode,
};

/// Bin number used for opaque drawables without explicit bin details
pub const DEFAULT_BIN_NUMBER: i32 = 0;

/// Bin number used for transparent drawables without explicit bin details
pub const TRANSPARENT_BIN_NUMBER: i32 = 10;

/// How drawables get their depth sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransparencySortMode {
    /// Distance of the bounding-box center along the view direction
    #[default]
    LookVectorDistance,
    /// Squared distance from the eye to the bounding-box center
    ObjectEyePointDistance,
}

/// Cull visitor options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CullSettings {
    /// Target near/far ratio for depth partitioning and near/far clamping
    pub near_far_ratio: f64,
    /// Near/far computation for the top-level stage
    pub compute_near_far: ComputeNearFarMode,
    /// Frustum planes used for culling; empty disables culling
    pub culling_mode: CullingMode,
    /// Depth key for render leaves
    pub transparency_sort: TransparencySortMode,
}

impl Default for CullSettings {
    fn default() -> Self {
        Self {
            near_far_ratio: DEFAULT_NEAR_FAR_RATIO,
            compute_near_far: ComputeNearFarMode::ComputeUsingBoundingVolumes,
            culling_mode: CullingMode::ENABLE_ALL,
            transparency_sort: TransparencySortMode::LookVectorDistance,
        }
    }
}

impl Config for CullSettings {}

/// Calculated near/far for the stage being filled
#[derive(Debug, Clone, Copy)]
struct NearFar {
    near: f64,
    far: f64,
}

impl NearFar {
    const EMPTY: Self = Self {
        near: f64::MAX,
        far: -f64::MAX,
    };
}

/// Scene traversal producing a [`RenderStage`] tree
#[derive(Debug)]
pub struct CullVisitor<'r> {
    settings: CullSettings,
    registry: &'r RenderBinRegistry,
    model_views: Vec<Mat4d>,
    projections: Vec<Mat4d>,
    viewports: Vec<Viewport>,
    frusta: Vec<Polytope>,
    stages: Vec<RenderStage>,
    near_far: NearFar,
}

impl<'r> CullVisitor<'r> {
    /// Visitor creating bins from `registry`
    pub fn new(settings: CullSettings, registry: &'r RenderBinRegistry) -> Self {
        Self {
            settings,
            registry,
            model_views: Vec::new(),
            projections: Vec::new(),
            viewports: Vec::new(),
            frusta: Vec::new(),
            stages: Vec::new(),
            near_far: NearFar::EMPTY,
        }
    }

    /// Current options
    pub fn settings(&self) -> &CullSettings {
        &self.settings
    }

    /// Replace the options
    pub fn set_settings(&mut self, settings: CullSettings) {
        self.settings = settings;
    }

    /// Cull `root` into a fresh top-level stage
    pub fn cull_scene(
        &mut self,
        graph: &SceneGraph,
        root: NodeId,
        view: &Mat4d,
        projection: &Mat4d,
        viewport: Viewport,
        clear_color: [f32; 4],
    ) -> RenderStage {
        self.model_views.clear();
        self.projections.clear();
        self.viewports.clear();
        self.frusta.clear();
        self.stages.clear();
        self.near_far = NearFar::EMPTY;

        self.stages.push(RenderStage::new(
            RenderOrder::PostRender,
            viewport,
            *projection,
            *view,
            ClearMask::COLOR | ClearMask::DEPTH,
            clear_color,
        ));
        self.viewports.push(viewport);
        self.projections.push(*projection);
        self.push_model_view(*view);

        graph.accept(root, self);

        self.pop_model_view();
        self.projections.pop();
        self.viewports.pop();

        let mut stage = self.stages.pop().unwrap_or_else(|| {
            RenderStage::new(
                RenderOrder::PostRender,
                viewport,
                *projection,
                *view,
                ClearMask::COLOR | ClearMask::DEPTH,
                clear_color,
            )
        });
        self.finish_stage(&mut stage);
        stage
    }

    /// Current model-view matrix
    pub fn model_view(&self) -> Mat4d {
        self.model_views.last().copied().unwrap_or_else(Mat4d::identity)
    }

    /// Current projection matrix
    pub fn projection(&self) -> Mat4d {
        self.projections.last().copied().unwrap_or_else(Mat4d::identity)
    }

    /// Current viewport
    pub fn viewport(&self) -> Viewport {
        self.viewports.last().copied().unwrap_or_default()
    }

    /// Clear color of the stage being filled
    pub fn render_stage_clear_color(&self) -> [f32; 4] {
        self.stages
            .last()
            .map_or([0.0, 0.0, 0.0, 1.0], |stage| stage.clear_color)
    }

    /// Cull a camera's children into a new child stage of the current one
    pub fn apply_camera(&mut self, graph: &SceneGraph, camera: &Camera) {
        let model_view = match camera.reference_frame {
            ReferenceFrame::Absolute => camera.view,
            ReferenceFrame::Relative => self.model_view() * camera.view,
        };

        let saved_settings = self.settings.clone();
        let saved_near_far = self.near_far;
        self.settings.compute_near_far = camera.compute_near_far;
        self.settings.culling_mode = camera.culling_mode;
        self.near_far = NearFar::EMPTY;

        self.viewports.push(camera.viewport);
        self.projections.push(camera.projection);
        self.push_model_view(model_view);

        let stage = RenderStage::new(
            camera.render_order,
            camera.viewport,
            camera.projection,
            model_view,
            camera.clear_mask,
            camera.clear_color,
        );
        self.stages.push(stage);

        for &child in camera.children() {
            graph.accept(child, self);
        }

        let finished = self.stages.pop();

        self.pop_model_view();
        self.projections.pop();
        self.viewports.pop();

        if let Some(mut stage) = finished {
            self.finish_stage(&mut stage);
            if let Some(parent) = self.stages.last_mut() {
                parent.add_child_stage(stage);
            }
        }

        self.settings = saved_settings;
        self.near_far = saved_near_far;
    }

    fn push_model_view(&mut self, model_view: Mat4d) {
        let mode = self.settings.culling_mode;
        let computing = self.settings.compute_near_far != ComputeNearFarMode::DoNotCompute;
        // Near and far are recomputed when computing, so only sides cull then
        let frustum = Polytope::from_matrices(
            &model_view,
            &self.projection(),
            mode.contains(CullingMode::NEAR_PLANE) && !computing,
            mode.contains(CullingMode::FAR_PLANE) && !computing,
        );
        self.model_views.push(model_view);
        self.frusta.push(frustum);
    }

    fn pop_model_view(&mut self) {
        self.model_views.pop();
        self.frusta.pop();
    }

    fn culling_enabled(&self) -> bool {
        !self.settings.culling_mode.is_empty()
    }

    fn is_culled(&self, bound: &BoundingSphere) -> bool {
        if !self.culling_enabled() || !bound.valid() {
            return false;
        }
        self.frusta
            .last()
            .is_some_and(|frustum| !frustum.contains_sphere(bound))
    }

    fn is_box_culled(&self, bb: &BoundingBox) -> bool {
        self.culling_enabled()
            && self
                .frusta
                .last()
                .is_some_and(|frustum| !frustum.contains_box(bb))
    }

    fn update_calculated_near_far(&mut self, bb: &BoundingBox) {
        let model_view = self.model_view();
        let corners = CornerPair::from_model_view(&model_view);
        let mut d_near = eye_distance(&bb.corner(corners.near), &model_view);
        let mut d_far = eye_distance(&bb.corner(corners.far), &model_view);

        if d_near > d_far {
            if !math::utils::nearly_equal(d_near, d_far) {
                log::warn!(
                    "Near/far inverted for drawable bounds ({} > {})",
                    d_near,
                    d_far
                );
            }
            std::mem::swap(&mut d_near, &mut d_far);
        }

        if d_far < 0.0 {
            return;
        }
        self.near_far.near = self.near_far.near.min(d_near);
        self.near_far.far = self.near_far.far.max(d_far);
    }

    fn leaf_depth(&self, bb: &BoundingBox) -> f32 {
        let center = bb.center();
        let depth = match self.settings.transparency_sort {
            TransparencySortMode::LookVectorDistance => eye_distance(&center, &self.model_view()),
            TransparencySortMode::ObjectEyePointDistance => {
                let eye = self.model_view() * Vec4d::new(center.x, center.y, center.z, 1.0);
                eye.xyz().norm_squared()
            }
        };
        depth as f32
    }

    /// Clamp the stage projection to the calculated near/far
    fn finish_stage(&self, stage: &mut RenderStage) {
        if self.settings.compute_near_far == ComputeNearFarMode::DoNotCompute {
            return;
        }
        let NearFar { near, far } = self.near_far;
        if far <= 0.0 || near > far {
            return;
        }

        let near = near.max(far * self.settings.near_far_ratio);
        log::trace!("Computed near/far ({}, {})", near, far);
        stage.replace_projection(clamp_projection(&stage.projection, near, far));
    }

    fn cull_drawable(&mut self, drawable: &Drawable) {
        let bb = &drawable.bounding_box;
        if !bb.valid() || self.is_box_culled(bb) {
            return;
        }

        if self.settings.compute_near_far != ComputeNearFarMode::DoNotCompute {
            self.update_calculated_near_far(bb);
        }

        let (bin_number, bin_name) = match drawable.state.as_deref() {
            Some(state) => match &state.bin_details {
                Some(details) => (details.bin_number, details.bin_name.as_str()),
                None if state.rendering_hint == RenderingHint::Transparent => {
                    (TRANSPARENT_BIN_NUMBER, "DepthSortedBin")
                }
                None => (DEFAULT_BIN_NUMBER, "RenderBin"),
            },
            None => (DEFAULT_BIN_NUMBER, "RenderBin"),
        };

        let leaf = RenderLeaf::new(
            drawable.id,
            self.model_view(),
            self.projection(),
            self.leaf_depth(bb),
            drawable.state.clone(),
        );

        let registry = self.registry;
        if let Some(stage) = self.stages.last_mut() {
            stage.add_leaf(bin_number, bin_name, registry, leaf);
        }
    }
}

impl NodeVisitor for CullVisitor<'_> {
    fn apply_group(&mut self, graph: &SceneGraph, id: NodeId) {
        if self.is_culled(&graph.bound(id)) {
            return;
        }
        self.traverse(graph, id);
    }

    fn apply_transform(&mut self, graph: &SceneGraph, id: NodeId, transform: &TransformNode) {
        if self.is_culled(&graph.bound(id)) {
            return;
        }

        let mut model_view = self.model_view();
        let pushed = transform.compute_local_to_world(&mut model_view);
        if pushed {
            self.push_model_view(model_view);
        }

        self.traverse(graph, id);

        if pushed {
            self.pop_model_view();
        }
    }

    fn apply_projection(&mut self, graph: &SceneGraph, id: NodeId, projection: &Mat4d) {
        if self.is_culled(&graph.bound(id)) {
            return;
        }

        self.projections.push(*projection);
        self.push_model_view(self.model_view());

        self.traverse(graph, id);

        self.pop_model_view();
        self.projections.pop();
    }

    fn apply_geode(&mut self, graph: &SceneGraph, id: NodeId, drawables: &[Drawable]) {
        if self.is_culled(&graph.bound(id)) {
            return;
        }
        for drawable in drawables {
            self.cull_drawable(drawable);
        }
    }

    fn apply_depth_partition(
        &mut self,
        graph: &SceneGraph,
        id: NodeId,
        partition: &RefCell<DepthPartitionNode>,
    ) {
        match partition.try_borrow_mut() {
            Ok(mut partition) => partition.cull(self, graph, id),
            Err(_) => {
                log::warn!("Depth partition {:?} reached while already being culled", id);
                self.apply_group(graph, id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::foundation::math::{Mat4Ext, Vec3d};
    use crate::scene::{DrawableId, StateSet};
    use approx::assert_relative_eq;

    fn cube(id: u64, z: f64, state: Option<Arc<StateSet>>) -> Drawable {
        let mut drawable = Drawable::new(
            DrawableId(id),
            BoundingBox::from_center_extents(Vec3d::new(0.0, 0.0, z), Vec3d::repeat(1.0)),
        );
        drawable.state = state;
        drawable
    }

    fn cull(graph: &SceneGraph, root: NodeId, settings: CullSettings) -> RenderStage {
        let registry = RenderBinRegistry::new();
        let mut cv = CullVisitor::new(settings, &registry);
        cv.cull_scene(
            graph,
            root,
            &Mat4d::identity(),
            &Mat4d::perspective(60.0, 1.0, 1.0, 1000.0),
            Viewport::new(0, 0, 800, 800),
            [0.0, 0.0, 0.0, 1.0],
        )
    }

    #[test]
    fn test_drawables_route_to_bins() {
        let glass = Arc::new(StateSet::new("glass", RenderingHint::Transparent));
        let hud = Arc::new(StateSet::new("hud", RenderingHint::Opaque).with_bin(20, "TraversalOrderBin"));

        let mut graph = SceneGraph::new();
        let geode = graph.create_geode(
            "mixed",
            vec![
                cube(1, -10.0, None),
                cube(2, -20.0, Some(glass)),
                cube(3, -30.0, Some(hud)),
            ],
        );

        let stage = cull(&graph, geode, CullSettings::default());
        let bins: Vec<(i32, &str, usize)> = stage
            .bins()
            .map(|(number, bin)| (number, bin.name(), bin.leaf_count()))
            .collect();
        assert_eq!(
            bins,
            vec![
                (0, "RenderBin", 1),
                (10, "DepthSortedBin", 1),
                (20, "TraversalOrderBin", 1),
            ]
        );
    }

    #[test]
    fn test_frustum_culling_drops_hidden_content() {
        let mut graph = SceneGraph::new();
        let root = graph.create_group("root");
        let visible = graph.create_geode("visible", vec![cube(1, -10.0, None)]);
        let behind = graph.create_geode("behind", vec![cube(2, 10.0, None)]);
        graph.add_child(root, visible).unwrap();
        graph.add_child(root, behind).unwrap();

        assert_eq!(cull(&graph, root, CullSettings::default()).total_leaf_count(), 1);

        let no_culling = CullSettings {
            culling_mode: CullingMode::empty(),
            ..CullSettings::default()
        };
        assert_eq!(cull(&graph, root, no_culling).total_leaf_count(), 2);
    }

    #[test]
    fn test_near_far_is_computed_from_bounds() {
        let mut graph = SceneGraph::new();
        let geode = graph.create_geode("pair", vec![cube(1, -10.0, None), cube(2, -100.0, None)]);

        let stage = cull(&graph, geode, CullSettings::default());
        let expected = clamp_projection(&Mat4d::perspective(60.0, 1.0, 1.0, 1000.0), 9.0, 101.0);
        assert_relative_eq!(stage.projection, expected, epsilon = 1e-9);

        let fixed = CullSettings {
            compute_near_far: ComputeNearFarMode::DoNotCompute,
            ..CullSettings::default()
        };
        let stage = cull(&graph, geode, fixed);
        assert_eq!(stage.projection, Mat4d::perspective(60.0, 1.0, 1.0, 1000.0));
    }

    #[test]
    fn test_leaf_depth_modes() {
        let registry = RenderBinRegistry::new();
        let mut cv = CullVisitor::new(CullSettings::default(), &registry);
        cv.push_model_view(Mat4d::identity());
        let bb = BoundingBox::from_center_extents(Vec3d::new(3.0, 4.0, -12.0), Vec3d::repeat(1.0));

        assert_relative_eq!(cv.leaf_depth(&bb), 12.0);
        cv.settings.transparency_sort = TransparencySortMode::ObjectEyePointDistance;
        assert_relative_eq!(cv.leaf_depth(&bb), 169.0);
    }

    #[test]
    fn test_settings_round_trip_through_toml() {
        let settings = CullSettings {
            near_far_ratio: 0.001,
            transparency_sort: TransparencySortMode::ObjectEyePointDistance,
            ..CullSettings::default()
        };
        let text = toml::to_string(&settings).unwrap();
        let parsed: CullSettings = toml::from_str(&text).unwrap();
        assert_eq!(parsed, settings);
    }
}
