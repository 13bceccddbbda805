//! Render bin trait and the state-sorted bin

use std::fmt;

use crate::render::render_leaf::{add_grouped, LeafIndex, RenderGraph, RenderLeaf};
use crate::render::GraphicsContext;

/// Collection of leaves drawn together under one ordering policy
///
/// Per frame a bin is reset, filled, sorted and drawn, in that order.
pub trait RenderBin: fmt::Debug {
    /// Registry name of the bin type
    fn name(&self) -> &str;

    /// Drop every leaf
    fn reset(&mut self);

    /// Queue a leaf
    fn add_leaf(&mut self, leaf: RenderLeaf);

    /// Establish draw order; call after the last leaf is added
    fn sort_local(&mut self);

    /// Draw every leaf, threading the previously drawn leaf through
    fn draw_local<'a>(&'a self, ctx: &mut dyn GraphicsContext, previous: &mut Option<&'a RenderLeaf>);

    /// Number of queued leaves
    fn leaf_count(&self) -> usize;

    /// Visit every leaf mutably, in no particular order
    fn for_each_leaf_mut(&mut self, f: &mut dyn FnMut(&mut RenderLeaf));
}

/// Ordering used by [`StateSortedBin`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BinSortMode {
    /// Group by state, states ordered by name
    #[default]
    SortByState,
    /// Draw leaves exactly as they were added
    TraversalOrder,
}

/// Bin minimising state changes, or keeping traversal order
#[derive(Debug, Clone, Default)]
pub struct StateSortedBin {
    sort_mode: BinSortMode,
    graphs: Vec<RenderGraph>,
    graph_order: Vec<usize>,
    insertion_order: Vec<LeafIndex>,
}

impl StateSortedBin {
    /// Empty bin with the given ordering
    pub fn new(sort_mode: BinSortMode) -> Self {
        Self {
            sort_mode,
            ..Self::default()
        }
    }

    /// Ordering policy
    pub fn sort_mode(&self) -> BinSortMode {
        self.sort_mode
    }

    /// State graphs in insertion order
    pub fn render_graphs(&self) -> &[RenderGraph] {
        &self.graphs
    }
}

impl RenderBin for StateSortedBin {
    fn name(&self) -> &str {
        match self.sort_mode {
            BinSortMode::SortByState => "RenderBin",
            BinSortMode::TraversalOrder => "TraversalOrderBin",
        }
    }

    fn reset(&mut self) {
        self.graphs.clear();
        self.graph_order.clear();
        self.insertion_order.clear();
    }

    fn add_leaf(&mut self, leaf: RenderLeaf) {
        let index = add_grouped(&mut self.graphs, leaf);
        // New graphs draw last until the next sort
        if index.graph == self.graph_order.len() {
            self.graph_order.push(index.graph);
        }
        self.insertion_order.push(index);
    }

    fn sort_local(&mut self) {
        if self.sort_mode == BinSortMode::SortByState {
            self.graph_order = (0..self.graphs.len()).collect();
            let graphs = &self.graphs;
            self.graph_order
                .sort_by(|&a, &b| graphs[a].state_name().cmp(graphs[b].state_name()));
        }
    }

    fn draw_local<'a>(&'a self, ctx: &mut dyn GraphicsContext, previous: &mut Option<&'a RenderLeaf>) {
        match self.sort_mode {
            BinSortMode::SortByState => {
                for &graph in &self.graph_order {
                    for leaf in &self.graphs[graph].leaves {
                        leaf.render(ctx, *previous);
                        *previous = Some(leaf);
                    }
                }
            }
            BinSortMode::TraversalOrder => {
                for index in &self.insertion_order {
                    let leaf = &self.graphs[index.graph].leaves[index.leaf];
                    leaf.render(ctx, *previous);
                    *previous = Some(leaf);
                }
            }
        }
    }

    fn leaf_count(&self) -> usize {
        self.insertion_order.len()
    }

    fn for_each_leaf_mut(&mut self, f: &mut dyn FnMut(&mut RenderLeaf)) {
        for leaf in self.graphs.iter_mut().flat_map(|g| g.leaves.iter_mut()) {
            f(leaf);
        }
    }
}
