//! Depth-sorted render bin
//!
//! Leaves are sorted ascending by depth. Back-to-front drawing walks the
//! sorted list in reverse, so the farthest leaf is drawn first; that is the
//! order blended geometry needs. Front-to-back walks it forward, which
//! suits early depth rejection.
//!
//! The bin does not care how depth was computed, only that a larger value
//! means farther away.

use serde::{Deserialize, Serialize};

use crate::render::render_bin::RenderBin;
use crate::render::render_leaf::{add_grouped, LeafIndex, RenderGraph, RenderLeaf};
use crate::render::GraphicsContext;

/// Direction in which a [`DepthSortedBin`] draws
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DrawOrder {
    /// Largest depth first
    #[default]
    BackToFront,
    /// Smallest depth first
    FrontToBack,
}

/// Bin drawing its leaves ordered by depth
#[derive(Debug, Clone, Default)]
pub struct DepthSortedBin {
    draw_order: DrawOrder,
    graphs: Vec<RenderGraph>,
    sorted: Vec<LeafIndex>,
}

impl DepthSortedBin {
    /// Empty bin
    pub fn new(draw_order: DrawOrder) -> Self {
        Self {
            draw_order,
            graphs: Vec::new(),
            sorted: Vec::new(),
        }
    }

    /// Change the draw direction
    pub fn set_draw_order(&mut self, draw_order: DrawOrder) {
        self.draw_order = draw_order;
    }

    /// Current draw direction
    pub fn draw_order(&self) -> DrawOrder {
        self.draw_order
    }

    /// Leaves in the order [`draw_local`](RenderBin::draw_local) visits them
    pub fn leaves_in_draw_order(&self) -> Vec<&RenderLeaf> {
        let sorted = self.sorted.iter().map(|index| self.leaf(*index));
        match self.draw_order {
            DrawOrder::BackToFront => sorted.rev().collect(),
            DrawOrder::FrontToBack => sorted.collect(),
        }
    }

    fn leaf(&self, index: LeafIndex) -> &RenderLeaf {
        &self.graphs[index.graph].leaves[index.leaf]
    }
}

impl RenderBin for DepthSortedBin {
    fn name(&self) -> &str {
        match self.draw_order {
            DrawOrder::BackToFront => "DepthSortedBin",
            DrawOrder::FrontToBack => "FrontToBackBin",
        }
    }

    fn reset(&mut self) {
        self.graphs.clear();
        self.sorted.clear();
    }

    fn add_leaf(&mut self, leaf: RenderLeaf) {
        let index = add_grouped(&mut self.graphs, leaf);
        self.sorted.push(index);
    }

    fn sort_local(&mut self) {
        let graphs = &self.graphs;
        self.sorted.sort_by(|a, b| {
            let da = graphs[a.graph].leaves[a.leaf].depth;
            let db = graphs[b.graph].leaves[b.leaf].depth;
            da.total_cmp(&db)
        });
    }

    fn draw_local<'a>(&'a self, ctx: &mut dyn GraphicsContext, previous: &mut Option<&'a RenderLeaf>) {
        for leaf in self.leaves_in_draw_order() {
            leaf.render(ctx, *previous);
            *previous = Some(leaf);
        }
    }

    fn leaf_count(&self) -> usize {
        self.graphs.iter().map(|g| g.leaves.len()).sum()
    }

    fn for_each_leaf_mut(&mut self, f: &mut dyn FnMut(&mut RenderLeaf)) {
        for leaf in self.graphs.iter_mut().flat_map(|g| g.leaves.iter_mut()) {
            f(leaf);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::foundation::math::Mat4d;
    use crate::render::RecordingContext;
    use crate::scene::{DrawableId, RenderingHint, StateSet};

    fn filled(order: DrawOrder, depths: &[f32]) -> DepthSortedBin {
        let glass = Arc::new(StateSet::new("glass", RenderingHint::Transparent));
        let smoke = Arc::new(StateSet::new("smoke", RenderingHint::Transparent));

        let mut bin = DepthSortedBin::new(order);
        for (i, &depth) in depths.iter().enumerate() {
            // Alternate states so leaves land in different render graphs
            let state = if i % 2 == 0 { &glass } else { &smoke };
            bin.add_leaf(RenderLeaf::new(
                DrawableId(i as u64),
                Mat4d::identity(),
                Mat4d::identity(),
                depth,
                Some(Arc::clone(state)),
            ));
        }
        bin.sort_local();
        bin
    }

    fn drawn_depths(bin: &DepthSortedBin) -> Vec<f32> {
        let mut ctx = RecordingContext::new();
        let mut previous = None;
        bin.draw_local(&mut ctx, &mut previous);

        let depth_of = |id: DrawableId| {
            bin.leaves_in_draw_order()
                .iter()
                .find(|leaf| leaf.drawable == id)
                .map(|leaf| leaf.depth)
        };
        ctx.draw_sequence().into_iter().filter_map(depth_of).collect()
    }

    #[test]
    fn test_back_to_front_draws_farthest_first() {
        let bin = filled(DrawOrder::BackToFront, &[3.0, 1.0, 2.0]);
        assert_eq!(drawn_depths(&bin), vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_front_to_back_draws_nearest_first() {
        let bin = filled(DrawOrder::FrontToBack, &[3.0, 1.0, 2.0]);
        assert_eq!(drawn_depths(&bin), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_draw_order_is_monotonic_across_state_groups() {
        let depths = [5.5, -2.0, 9.0, 0.0, 9.0, 3.25, 7.0, -8.5];

        let back = drawn_depths(&filled(DrawOrder::BackToFront, &depths));
        assert_eq!(back.len(), depths.len());
        assert!(back.windows(2).all(|w| w[0] >= w[1]));

        let front = drawn_depths(&filled(DrawOrder::FrontToBack, &depths));
        assert!(front.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_previous_leaf_is_threaded() {
        let bin = filled(DrawOrder::BackToFront, &[1.0, 2.0]);
        let mut ctx = RecordingContext::new();
        let mut previous = None;
        bin.draw_local(&mut ctx, &mut previous);

        assert_eq!(previous.map(|leaf| leaf.depth), Some(1.0));
        // Both leaves share matrices, so only the first loads them
        assert_eq!(ctx.projection_loads(), 1);
    }

    #[test]
    fn test_late_leaves_are_drawn_and_sorted() {
        let mut bin = DepthSortedBin::new(DrawOrder::BackToFront);
        bin.add_leaf(RenderLeaf::new(DrawableId(7), Mat4d::identity(), Mat4d::identity(), 4.0, None));
        assert_eq!(bin.leaves_in_draw_order().len(), 1);

        let mut bin = filled(DrawOrder::BackToFront, &[3.0, 1.0]);
        bin.add_leaf(RenderLeaf::new(DrawableId(9), Mat4d::identity(), Mat4d::identity(), 2.0, None));
        assert_eq!(bin.leaves_in_draw_order().len(), 3);

        bin.sort_local();
        assert_eq!(drawn_depths(&bin), vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_reset_clears_leaves() {
        let mut bin = filled(DrawOrder::BackToFront, &[1.0, 2.0, 3.0]);
        assert_eq!(bin.leaf_count(), 3);
        bin.reset();
        assert_eq!(bin.leaf_count(), 0);
        assert!(bin.leaves_in_draw_order().is_empty());
    }
}
