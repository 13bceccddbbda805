//! Render leaves and state graphs
//!
//! A [`RenderLeaf`] is one queued draw. Leaves sharing a [`StateSet`] are
//! collected into a [`RenderGraph`] so bins can draw a whole state group
//! after one state change.

use std::sync::Arc;

use crate::foundation::math::Mat4d;
use crate::render::GraphicsContext;
use crate::scene::{DrawableId, StateSet};

/// One drawable queued for drawing
#[derive(Debug, Clone, PartialEq)]
pub struct RenderLeaf {
    /// Geometry to draw
    pub drawable: DrawableId,
    /// Model-view at the point of cull
    pub model_view: Mat4d,
    /// Projection at the point of cull
    pub projection: Mat4d,
    /// Sort key for depth-sorted bins; larger is farther
    pub depth: f32,
    /// Shared state, if any
    pub state: Option<Arc<StateSet>>,
}

impl RenderLeaf {
    /// Queue a drawable
    pub fn new(
        drawable: DrawableId,
        model_view: Mat4d,
        projection: Mat4d,
        depth: f32,
        state: Option<Arc<StateSet>>,
    ) -> Self {
        Self {
            drawable,
            model_view,
            projection,
            depth,
            state,
        }
    }

    /// Issue the draw, skipping loads that `previous` already made
    pub fn render(&self, ctx: &mut dyn GraphicsContext, previous: Option<&RenderLeaf>) {
        match previous {
            Some(prev) => {
                if !same_state(&prev.state, &self.state) {
                    ctx.apply_state(self.state.as_deref());
                }
                if prev.projection != self.projection {
                    ctx.load_projection(&self.projection);
                }
                if prev.model_view != self.model_view {
                    ctx.load_model_view(&self.model_view);
                }
            }
            None => {
                ctx.apply_state(self.state.as_deref());
                ctx.load_projection(&self.projection);
                ctx.load_model_view(&self.model_view);
            }
        }
        ctx.draw(self.drawable);
    }
}

/// States are shared by pointer; two leaves share state only if they share the Arc
pub(crate) fn same_state(a: &Option<Arc<StateSet>>, b: &Option<Arc<StateSet>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// Leaves sharing one state
#[derive(Debug, Clone, Default)]
pub struct RenderGraph {
    /// Shared state of every leaf
    pub state: Option<Arc<StateSet>>,
    /// Leaves in insertion order
    pub leaves: Vec<RenderLeaf>,
}

impl RenderGraph {
    /// Empty graph for `state`
    pub fn new(state: Option<Arc<StateSet>>) -> Self {
        Self {
            state,
            leaves: Vec::new(),
        }
    }

    /// Sort key used by state-sorted bins
    pub fn state_name(&self) -> &str {
        self.state.as_deref().map_or("", |s| s.name.as_str())
    }
}

/// Position of a leaf inside a list of render graphs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LeafIndex {
    pub graph: usize,
    pub leaf: usize,
}

/// Add `leaf` to the graph for its state, creating the graph if needed
pub(crate) fn add_grouped(graphs: &mut Vec<RenderGraph>, leaf: RenderLeaf) -> LeafIndex {
    let graph = match graphs.iter().position(|g| same_state(&g.state, &leaf.state)) {
        Some(index) => index,
        None => {
            graphs.push(RenderGraph::new(leaf.state.clone()));
            graphs.len() - 1
        }
    };
    graphs[graph].leaves.push(leaf);
    LeafIndex {
        graph,
        leaf: graphs[graph].leaves.len() - 1,
    }
}
