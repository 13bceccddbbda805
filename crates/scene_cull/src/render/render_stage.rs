//! Render stages
//!
//! A stage is the output of culling one camera: its matrices, viewport and
//! clear settings, its bins keyed by bin number, and the stages of cameras
//! found underneath it.
//!
//! ## Draw order
//!
//! ```text
//! pre-render stages
//! viewport, clear, projection
//! bins, ascending bin number
//! nested stages
//! post-render stages
//! ```

use std::collections::BTreeMap;

use crate::foundation::math::Mat4d;
use crate::partition::{ClearMask, RenderOrder, Viewport};
use crate::render::{GraphicsContext, RenderBin, RenderBinRegistry, RenderLeaf};

/// Cull output for one camera
#[derive(Debug)]
pub struct RenderStage {
    /// Placement relative to the parent stage
    pub render_order: RenderOrder,
    /// Buffers cleared before drawing
    pub clear_mask: ClearMask,
    /// Clear color
    pub clear_color: [f32; 4],
    /// Viewport
    pub viewport: Viewport,
    /// Projection loaded before the bins draw
    pub projection: Mat4d,
    /// View matrix of the camera
    pub view: Mat4d,
    bins: BTreeMap<i32, Box<dyn RenderBin>>,
    pre_render_stages: Vec<RenderStage>,
    nested_stages: Vec<RenderStage>,
    post_render_stages: Vec<RenderStage>,
}

impl RenderStage {
    /// Empty stage
    pub fn new(
        render_order: RenderOrder,
        viewport: Viewport,
        projection: Mat4d,
        view: Mat4d,
        clear_mask: ClearMask,
        clear_color: [f32; 4],
    ) -> Self {
        Self {
            render_order,
            clear_mask,
            clear_color,
            viewport,
            projection,
            view,
            bins: BTreeMap::new(),
            pre_render_stages: Vec::new(),
            nested_stages: Vec::new(),
            post_render_stages: Vec::new(),
        }
    }

    /// Queue a leaf in bin `bin_number`, creating the bin from `bin_name`
    /// if this stage has no bin with that number yet
    pub fn add_leaf(
        &mut self,
        bin_number: i32,
        bin_name: &str,
        registry: &RenderBinRegistry,
        leaf: RenderLeaf,
    ) {
        self.bins
            .entry(bin_number)
            .or_insert_with(|| {
                log::debug!("Creating render bin {} '{}'", bin_number, bin_name);
                registry.create(bin_name)
            })
            .add_leaf(leaf);
    }

    /// Attach the stage of a camera culled under this one
    pub fn add_child_stage(&mut self, stage: RenderStage) {
        match stage.render_order {
            RenderOrder::PreRender => self.pre_render_stages.push(stage),
            RenderOrder::NestedRender => self.nested_stages.push(stage),
            RenderOrder::PostRender => self.post_render_stages.push(stage),
        }
    }

    /// Bin with the given number
    pub fn bin(&self, bin_number: i32) -> Option<&dyn RenderBin> {
        self.bins.get(&bin_number).map(|bin| bin.as_ref())
    }

    /// Bins in draw order
    pub fn bins(&self) -> impl Iterator<Item = (i32, &dyn RenderBin)> {
        self.bins.iter().map(|(&number, bin)| (number, bin.as_ref()))
    }

    /// Stages drawn before this one's bins
    pub fn pre_render_stages(&self) -> &[RenderStage] {
        &self.pre_render_stages
    }

    /// Stages drawn after this one's bins
    pub fn nested_stages(&self) -> &[RenderStage] {
        &self.nested_stages
    }

    /// Stages drawn last
    pub fn post_render_stages(&self) -> &[RenderStage] {
        &self.post_render_stages
    }

    /// Leaves in this stage's own bins
    pub fn leaf_count(&self) -> usize {
        self.bins.values().map(|bin| bin.leaf_count()).sum()
    }

    /// Leaves in this stage and every child stage
    pub fn total_leaf_count(&self) -> usize {
        self.leaf_count() + self.child_stages().map(RenderStage::total_leaf_count).sum::<usize>()
    }

    fn child_stages(&self) -> impl Iterator<Item = &RenderStage> {
        self.pre_render_stages
            .iter()
            .chain(&self.nested_stages)
            .chain(&self.post_render_stages)
    }

    /// Rewrite the projection, and every leaf that used the old one
    pub fn replace_projection(&mut self, projection: Mat4d) {
        let previous = self.projection;
        for bin in self.bins.values_mut() {
            bin.for_each_leaf_mut(&mut |leaf| {
                if leaf.projection == previous {
                    leaf.projection = projection;
                }
            });
        }
        self.projection = projection;
    }

    /// Sort every bin of this stage and its children
    pub fn sort(&mut self) {
        for bin in self.bins.values_mut() {
            bin.sort_local();
        }
        for stage in self
            .pre_render_stages
            .iter_mut()
            .chain(&mut self.nested_stages)
            .chain(&mut self.post_render_stages)
        {
            stage.sort();
        }
    }

    /// Draw the stage tree; call [`sort`](Self::sort) first
    pub fn draw(&self, ctx: &mut dyn GraphicsContext) {
        for stage in &self.pre_render_stages {
            stage.draw(ctx);
        }

        ctx.set_viewport(&self.viewport);
        if !self.clear_mask.is_empty() {
            ctx.clear(self.clear_mask, self.clear_color);
        }
        ctx.load_projection(&self.projection);

        let mut previous: Option<&RenderLeaf> = None;
        for bin in self.bins.values() {
            bin.draw_local(ctx, &mut previous);
        }

        for stage in &self.nested_stages {
            stage.draw(ctx);
        }
        for stage in &self.post_render_stages {
            stage.draw(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::render::{GraphicsCommand, RecordingContext};
    use crate::scene::{DrawableId, RenderingHint, StateSet};

    fn stage(order: RenderOrder, mask: ClearMask) -> RenderStage {
        RenderStage::new(
            order,
            Viewport::new(0, 0, 640, 480),
            Mat4d::identity(),
            Mat4d::identity(),
            mask,
            [0.1, 0.2, 0.3, 1.0],
        )
    }

    fn leaf(id: u64, depth: f32) -> RenderLeaf {
        RenderLeaf::new(DrawableId(id), Mat4d::identity(), Mat4d::identity(), depth, None)
    }

    #[test]
    fn test_bins_draw_in_ascending_number() {
        let registry = RenderBinRegistry::new();
        let mut root = stage(RenderOrder::PostRender, ClearMask::DEPTH);
        root.add_leaf(10, "DepthSortedBin", &registry, leaf(1, 5.0));
        root.add_leaf(10, "DepthSortedBin", &registry, leaf(2, 9.0));
        root.add_leaf(-1, "RenderBin", &registry, leaf(3, 0.0));
        root.add_leaf(0, "RenderBin", &registry, leaf(4, 0.0));
        root.sort();

        let mut ctx = RecordingContext::new();
        root.draw(&mut ctx);
        assert_eq!(
            ctx.draw_sequence(),
            vec![DrawableId(3), DrawableId(4), DrawableId(2), DrawableId(1)]
        );
        assert_eq!(root.bin(10).map(|b| b.name()), Some("DepthSortedBin"));
    }

    #[test]
    fn test_child_stages_draw_around_parent() {
        let registry = RenderBinRegistry::new();
        let mut root = stage(RenderOrder::PostRender, ClearMask::COLOR | ClearMask::DEPTH);
        root.add_leaf(0, "RenderBin", &registry, leaf(1, 0.0));

        let mut pre = stage(RenderOrder::PreRender, ClearMask::empty());
        pre.add_leaf(0, "RenderBin", &registry, leaf(2, 0.0));
        let mut nested = stage(RenderOrder::NestedRender, ClearMask::DEPTH);
        nested.add_leaf(0, "RenderBin", &registry, leaf(3, 0.0));
        let mut post = stage(RenderOrder::PostRender, ClearMask::DEPTH);
        post.add_leaf(0, "RenderBin", &registry, leaf(4, 0.0));

        root.add_child_stage(post);
        root.add_child_stage(nested);
        root.add_child_stage(pre);
        root.sort();
        assert_eq!(root.total_leaf_count(), 4);

        let mut ctx = RecordingContext::new();
        root.draw(&mut ctx);
        assert_eq!(
            ctx.draw_sequence(),
            vec![DrawableId(2), DrawableId(1), DrawableId(3), DrawableId(4)]
        );

        // The pre-render stage has an empty mask, so the first clear is the root's
        let first_clear = ctx
            .commands()
            .iter()
            .find(|c| matches!(c, GraphicsCommand::Clear { .. }))
            .cloned();
        assert_eq!(
            first_clear,
            Some(GraphicsCommand::Clear {
                mask: ClearMask::COLOR | ClearMask::DEPTH,
                color: [0.1, 0.2, 0.3, 1.0],
            })
        );
    }

    #[test]
    fn test_replace_projection_updates_matching_leaves() {
        let registry = RenderBinRegistry::new();
        let mut root = stage(RenderOrder::PostRender, ClearMask::DEPTH);
        let state = Arc::new(StateSet::new("s", RenderingHint::Opaque));
        root.add_leaf(0, "RenderBin", &registry, leaf(1, 0.0));

        let mut other = leaf(2, 0.0);
        other.projection = Mat4d::new_scaling(2.0);
        other.state = Some(state);
        root.add_leaf(0, "RenderBin", &registry, other);

        let clamped = Mat4d::new_scaling(3.0);
        root.replace_projection(clamped);
        root.sort();

        let mut ctx = RecordingContext::new();
        root.draw(&mut ctx);
        let loads: Vec<Mat4d> = ctx
            .commands()
            .iter()
            .filter_map(|c| match c {
                GraphicsCommand::LoadProjection(m) => Some(*m),
                _ => None,
            })
            .collect();
        assert!(loads.contains(&clamped));
        assert!(loads.contains(&Mat4d::new_scaling(2.0)));
        assert!(!loads.contains(&Mat4d::identity()));
    }
}
