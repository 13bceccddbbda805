//! # Scene Cull
//!
//! Scene-graph cull pipeline with depth-partitioned cameras and
//! depth-sorted render bins.
//!
//! ## Features
//!
//! - **Depth partitioning**: scenes spanning huge depth ranges are split
//!   into segments, each drawn with its own clamped projection
//! - **Render bins**: state-sorted, traversal-order and depth-sorted bins
//!   created through an explicit registry
//! - **Arena scene graph**: slot-map storage with explicit bound refresh
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_cull::prelude::*;
//!
//! let mut graph = SceneGraph::new();
//! let partition = graph.create_depth_partition("world", DepthPartitionNode::new());
//! let planet = graph.create_geode(
//!     "planet",
//!     vec![Drawable::new(
//!         DrawableId(1),
//!         BoundingBox::from_center_extents(Vec3d::new(0.0, 0.0, -1.0e6), Vec3d::repeat(6.0e5)),
//!     )],
//! );
//! graph.add_child(partition, planet).unwrap();
//!
//! let registry = RenderBinRegistry::new();
//! let mut cull = CullVisitor::new(CullSettings::default(), &registry);
//! let mut stage = cull.cull_scene(
//!     &graph,
//!     partition,
//!     &Mat4d::identity(),
//!     &Mat4d::perspective(45.0, 16.0 / 9.0, 1.0, 10.0),
//!     Viewport::new(0, 0, 1280, 720),
//!     [0.0, 0.0, 0.0, 1.0],
//! );
//! stage.sort();
//! stage.draw(&mut RecordingContext::new());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod partition;
pub mod render;
pub mod scene;

/// Common imports for library users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, PartitionConfig},
        foundation::math::{Mat4Ext, Mat4d, Vec3d},
        partition::{
            Camera, ClearMask, DepthPartitionNode, DistanceAccumulator, DistancePair, RenderOrder,
            Viewport,
        },
        render::{
            CullSettings, CullVisitor, DepthSortedBin, DrawOrder, GraphicsContext, RecordingContext,
            RenderBin, RenderBinRegistry, RenderStage,
        },
        scene::{
            BoundingBox, Drawable, DrawableId, NodeId, NodeVisitor, RenderingHint, SceneError,
            SceneGraph, StateSet, TransformNode,
        },
    };
}
