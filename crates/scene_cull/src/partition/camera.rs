//! # Partition Cameras
//!
//! One camera per depth segment. A camera renders the partition node's
//! children with its own clamped projection, an absolute view matrix and a
//! render order that places it before or after the enclosing stage.
//!
//! ## Clamping
//!
//! Every segment shares the field of view of the scene projection; only the
//! depth mapping changes. See [`clamp_projection`].

use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::foundation::math::{self, Mat4d};
use crate::scene::{NodeId, ReferenceFrame};

/// Segment edges are widened by this factor so boundary geometry survives
/// clipping in both neighbouring segments
const NEAR_INFLATION: f64 = 0.999;
const FAR_INFLATION: f64 = 1.001;

static NEXT_CAMERA_ID: AtomicU64 = AtomicU64::new(1);

bitflags! {
    /// Buffers cleared before a camera draws
    ///
    /// Bit values match the OpenGL buffer bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ClearMask: u32 {
        /// Depth buffer
        const DEPTH = 0x0000_0100;
        /// Stencil buffer
        const STENCIL = 0x0000_0400;
        /// Color buffer
        const COLOR = 0x0000_4000;
    }
}

bitflags! {
    /// Which frustum planes the cull visitor tests against
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CullingMode: u32 {
        /// Left, right, bottom and top planes
        const VIEW_FRUSTUM_SIDES = 0b001;
        /// Near plane
        const NEAR_PLANE = 0b010;
        /// Far plane
        const FAR_PLANE = 0b100;
        /// Every plane
        const ENABLE_ALL = Self::VIEW_FRUSTUM_SIDES.bits()
            | Self::NEAR_PLANE.bits()
            | Self::FAR_PLANE.bits();
    }
}

impl Default for CullingMode {
    fn default() -> Self {
        Self::ENABLE_ALL
    }
}

/// When a camera's stage is drawn relative to the enclosing stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RenderOrder {
    /// Before the enclosing stage's own bins
    PreRender,
    /// Inline, after the enclosing stage's bins and before post-render stages
    NestedRender,
    /// After the enclosing stage
    #[default]
    PostRender,
}

/// How the cull visitor derives near/far for a camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ComputeNearFarMode {
    /// Use the projection as given
    DoNotCompute,
    /// Track the nearest and farthest drawable bounding-box corners
    #[default]
    ComputeUsingBoundingVolumes,
}

/// Window-space rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Viewport {
    /// Left edge in pixels
    pub x: i32,
    /// Bottom edge in pixels
    pub y: i32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Viewport {
    /// Create a viewport
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// width / height, or 1 for a degenerate viewport
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            1.0
        } else {
            f64::from(self.width) / f64::from(self.height)
        }
    }
}

/// Render-to-framebuffer camera owned by a depth partition
///
/// Children are handles into the scene graph that owns them; the camera
/// never owns geometry.
#[derive(Debug, Clone)]
pub struct Camera {
    id: u64,
    /// Placement relative to the enclosing stage
    pub render_order: RenderOrder,
    /// Partition cameras always use [`ReferenceFrame::Absolute`]
    pub reference_frame: ReferenceFrame,
    /// Partition cameras carry exact near/far and never recompute them
    pub compute_near_far: ComputeNearFarMode,
    /// Planes tested for the camera's children
    pub culling_mode: CullingMode,
    /// Whether the camera itself may be culled
    pub culling_active: bool,
    /// Buffers cleared before drawing
    pub clear_mask: ClearMask,
    /// RGBA clear color
    pub clear_color: [f32; 4],
    /// Clamped projection for this segment
    pub projection: Mat4d,
    /// View matrix captured from the cull visitor
    pub view: Mat4d,
    /// Viewport captured from the cull visitor
    pub viewport: Viewport,
    children: Vec<NodeId>,
}

impl Camera {
    /// Camera configured for one depth segment
    pub fn for_segment(render_order: RenderOrder, clear_mask: ClearMask, children: Vec<NodeId>) -> Self {
        Self {
            id: NEXT_CAMERA_ID.fetch_add(1, Ordering::Relaxed),
            render_order,
            reference_frame: ReferenceFrame::Absolute,
            compute_near_far: ComputeNearFarMode::DoNotCompute,
            culling_mode: CullingMode::ENABLE_ALL,
            culling_active: false,
            clear_mask,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            projection: Mat4d::identity(),
            view: Mat4d::identity(),
            viewport: Viewport::default(),
            children,
        }
    }

    /// Process-unique identity, stable while the camera is reused
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Child handles in order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub(crate) fn insert_child(&mut self, index: usize, child: NodeId) {
        let index = index.min(self.children.len());
        self.children.insert(index, child);
    }

    pub(crate) fn remove_children(&mut self, pos: usize, count: usize) {
        if pos >= self.children.len() {
            return;
        }
        let end = (pos + count).min(self.children.len());
        self.children.drain(pos..end);
    }

    pub(crate) fn set_child(&mut self, index: usize, child: NodeId) {
        if let Some(slot) = self.children.get_mut(index) {
            *slot = child;
        }
    }

    /// Replace the projection with `projection` clamped to (near, far)
    pub fn set_clamped_projection(&mut self, projection: &Mat4d, z_near: f64, z_far: f64) {
        self.projection = clamp_projection(projection, z_near, z_far);
    }
}

/// Rewrite the depth mapping of `projection` to cover (near, far)
///
/// The interval is first widened slightly. Orthographic projections get
/// their depth row replaced; perspective projections are rescaled in clip
/// space so the field of view stays exactly the same.
pub fn clamp_projection(projection: &Mat4d, z_near: f64, z_far: f64) -> Mat4d {
    let z_near = z_near * NEAR_INFLATION;
    let z_far = z_far * FAR_INFLATION;
    let mut clamped = *projection;

    if math::is_orthographic(projection) {
        clamped[(2, 2)] = -2.0 / (z_far - z_near);
        clamped[(2, 3)] = -(z_far + z_near) / (z_far - z_near);
        return clamped;
    }

    // Where the current projection puts eye-space z = -near and z = -far
    let trans_near = (-z_near * projection[(2, 2)] + projection[(2, 3)])
        / (-z_near * projection[(3, 2)] + projection[(3, 3)]);
    let trans_far = (-z_far * projection[(2, 2)] + projection[(2, 3)])
        / (-z_far * projection[(3, 2)] + projection[(3, 3)]);

    let ratio = (2.0 / (trans_near - trans_far)).abs();
    let center = -0.5 * (trans_near + trans_far);

    let mut rescale = Mat4d::identity();
    rescale[(2, 2)] = ratio;
    rescale[(2, 3)] = center * ratio;
    rescale * clamped
}
