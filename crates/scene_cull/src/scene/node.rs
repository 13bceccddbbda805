//! Scene node kinds, drawables and render state

use std::cell::RefCell;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use crate::foundation::math::{self, Mat4d};
use crate::partition::DepthPartitionNode;
use crate::scene::{BoundingBox, BoundingSphere};

new_key_type! {
    /// Stable handle to a node stored in a [`SceneGraph`](crate::scene::SceneGraph)
    pub struct NodeId;
}

/// Opaque handle to the geometry a backend draws for a drawable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrawableId(pub u64);

/// How a state set wants to be binned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RenderingHint {
    /// Let the cull visitor pick the default bin
    #[default]
    Default,
    /// Opaque geometry, drawn from the state-sorted bin
    Opaque,
    /// Blended geometry, drawn from the depth-sorted bin
    Transparent,
}

/// Explicit render bin placement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderBinDetails {
    /// Bins are drawn in ascending bin number
    pub bin_number: i32,
    /// Name looked up in the [`RenderBinRegistry`](crate::render::RenderBinRegistry)
    pub bin_name: String,
}

/// Graphics state shared between drawables
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StateSet {
    /// Debug name
    pub name: String,
    /// Binning hint
    pub rendering_hint: RenderingHint,
    /// Overrides the hint when set
    pub bin_details: Option<RenderBinDetails>,
}

impl StateSet {
    /// Named state with a rendering hint
    pub fn new(name: impl Into<String>, rendering_hint: RenderingHint) -> Self {
        Self {
            name: name.into(),
            rendering_hint,
            bin_details: None,
        }
    }

    /// Place drawables using this state into an explicit bin
    pub fn with_bin(mut self, bin_number: i32, bin_name: impl Into<String>) -> Self {
        self.bin_details = Some(RenderBinDetails {
            bin_number,
            bin_name: bin_name.into(),
        });
        self
    }
}

/// Leaf geometry held by a geode
#[derive(Debug, Clone)]
pub struct Drawable {
    /// Backend geometry handle
    pub id: DrawableId,
    /// Local-space bounds
    pub bounding_box: BoundingBox,
    /// Optional shared state
    pub state: Option<Arc<StateSet>>,
}

impl Drawable {
    /// Drawable without its own state
    pub fn new(id: DrawableId, bounding_box: BoundingBox) -> Self {
        Self {
            id,
            bounding_box,
            state: None,
        }
    }

    /// Attach shared state
    pub fn with_state(mut self, state: Arc<StateSet>) -> Self {
        self.state = Some(state);
        self
    }
}

/// Whether a transform composes with its parent or replaces it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReferenceFrame {
    /// Post-multiplies the inherited model-view
    #[default]
    Relative,
    /// The matrix becomes the model-view, ignoring ancestors
    Absolute,
}

/// Matrix transform node payload
#[derive(Debug, Clone, PartialEq)]
pub struct TransformNode {
    /// Local transform
    pub matrix: Mat4d,
    /// Composition rule
    pub reference_frame: ReferenceFrame,
}

impl TransformNode {
    /// Relative transform
    pub fn new(matrix: Mat4d) -> Self {
        Self {
            matrix,
            reference_frame: ReferenceFrame::Relative,
        }
    }

    /// Absolute transform
    pub fn absolute(matrix: Mat4d) -> Self {
        Self {
            matrix,
            reference_frame: ReferenceFrame::Absolute,
        }
    }

    /// Fold this transform into `matrix`
    ///
    /// Returns false, leaving `matrix` untouched, when the transform cannot
    /// contribute a frame (non-finite matrix).
    pub fn compute_local_to_world(&self, matrix: &mut Mat4d) -> bool {
        if !math::is_finite(&self.matrix) {
            log::warn!("Transform with non-finite matrix ignored");
            return false;
        }
        match self.reference_frame {
            ReferenceFrame::Relative => *matrix *= self.matrix,
            ReferenceFrame::Absolute => *matrix = self.matrix,
        }
        true
    }

    /// Bound of the children once moved into the parent's space
    pub fn transform_bound(&self, child_bound: &BoundingSphere) -> BoundingSphere {
        match self.reference_frame {
            ReferenceFrame::Relative => child_bound.transformed(&self.matrix),
            // Absolute content is not positioned relative to the parent
            ReferenceFrame::Absolute => BoundingSphere::invalid(),
        }
    }
}

/// Closed set of node kinds the traversals understand
#[derive(Debug)]
pub enum NodeKind {
    /// Plain grouping node
    Group,
    /// Matrix transform
    Transform(TransformNode),
    /// Replaces the projection matrix for its subgraph
    Projection(Mat4d),
    /// Geometry container
    Geode(Vec<Drawable>),
    /// Splits its subgraph into depth-safe camera segments during cull
    ///
    /// The partition mutates its camera list while the graph is borrowed
    /// for traversal, hence the cell.
    DepthPartition(Box<RefCell<DepthPartitionNode>>),
}

impl NodeKind {
    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Group => "Group",
            NodeKind::Transform(_) => "Transform",
            NodeKind::Projection(_) => "Projection",
            NodeKind::Geode(_) => "Geode",
            NodeKind::DepthPartition(_) => "DepthPartition",
        }
    }
}

/// Node stored in the scene arena
#[derive(Debug)]
pub struct Node {
    /// Debug name
    pub name: String,
    /// Kind-specific payload
    pub kind: NodeKind,
    pub(crate) children: Vec<NodeId>,
    pub(crate) parents: Vec<NodeId>,
    pub(crate) cached_bound: Option<BoundingSphere>,
}

impl Node {
    /// New unattached node
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            children: Vec::new(),
            parents: Vec::new(),
            cached_bound: None,
        }
    }

    /// Child handles in order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Parent handles
    pub fn parents(&self) -> &[NodeId] {
        &self.parents
    }

    /// Whether a memoised bound is available
    pub fn is_bound_stale(&self) -> bool {
        self.cached_bound.is_none()
    }
}
