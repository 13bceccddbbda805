//! Cull output and draw dispatch
//!
//! ## Architecture
//!
//! ```text
//! CullVisitor ──▶ RenderStage ──▶ RenderBin (by bin number) ──▶ RenderLeaf
//!                     │                                            │
//!                     └── pre / nested / post child stages         ▼
//!                                                           GraphicsContext
//! ```
//!
//! Bins are created by name through a [`RenderBinRegistry`] owned by the
//! application and shared with the cull visitor.

mod context;
mod cull_visitor;
mod depth_sorted_bin;
mod registry;
mod render_bin;
mod render_leaf;
mod render_stage;

pub use context::{GraphicsCommand, GraphicsContext, RecordingContext};
pub use cull_visitor::{
    CullSettings, CullVisitor, TransparencySortMode, DEFAULT_BIN_NUMBER, TRANSPARENT_BIN_NUMBER,
};
pub use depth_sorted_bin::{DepthSortedBin, DrawOrder};
pub use registry::{RenderBinRegistry, DEFAULT_BIN_NAME};
pub use render_bin::{BinSortMode, RenderBin, StateSortedBin};
pub use render_leaf::{RenderGraph, RenderLeaf};
pub use render_stage::RenderStage;
