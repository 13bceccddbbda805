//! Depth partitioning
//!
//! Scenes spanning many orders of magnitude of depth lose z-buffer
//! precision when drawn through one projection. A [`DepthPartitionNode`]
//! splits its subgraph into depth segments and culls it once per segment,
//! each segment with a projection clamped to its own (near, far) range.
//!
//! ## Pipeline
//!
//! ```text
//! DistanceAccumulator   one pass over the children, (near, far) per node
//!        ↓
//! compute_camera_pairs  merge overlaps, split spans logarithmically
//!        ↓
//! Camera per segment    far to near, clamped projection, culled in place
//! ```

mod camera;
mod depth_partition_node;
mod distance_accumulator;
pub mod segment_planner;

#[cfg(test)]
mod tests;

pub use camera::{
    clamp_projection, Camera, ClearMask, ComputeNearFarMode, CullingMode, RenderOrder, Viewport,
};
pub use depth_partition_node::DepthPartitionNode;
pub use distance_accumulator::{CornerPair, DistanceAccumulator, DEFAULT_NEAR_FAR_RATIO};
pub use segment_planner::{compute_camera_pairs, DistancePair};
