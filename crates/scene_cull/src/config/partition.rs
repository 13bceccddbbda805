//! Depth partition settings

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::partition::RenderOrder;
use crate::render::DrawOrder;

/// Options for a [`DepthPartitionNode`](crate::partition::DepthPartitionNode)
/// and the depth-sorted bin it feeds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    /// Partition at all; when false the node acts as a group
    pub active: bool,
    /// Farthest segment clears color as well as depth
    pub clear_color_buffer: bool,
    /// Render order of the segment cameras
    pub render_order: RenderOrder,
    /// Depth below which nodes are measured as a whole
    pub max_traversal_depth: u32,
    /// Fixed near/far ratio in (0, 1); unset follows the cull settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub near_far_ratio: Option<f64>,
    /// Draw direction for the `DepthSortedBin` bin type
    pub draw_order: DrawOrder,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            active: true,
            clear_color_buffer: true,
            render_order: RenderOrder::PostRender,
            max_traversal_depth: u32::MAX,
            near_far_ratio: None,
            draw_order: DrawOrder::BackToFront,
        }
    }
}

impl Config for PartitionConfig {}
