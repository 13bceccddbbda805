//! Graphics context abstraction
//!
//! Render stages and leaves talk to the graphics API only through
//! [`GraphicsContext`]. [`RecordingContext`] captures the calls instead of
//! issuing them, which is what tests and the demo use.

use crate::foundation::math::Mat4d;
use crate::partition::{ClearMask, Viewport};
use crate::scene::{DrawableId, StateSet};

/// Sink for draw-time graphics calls
pub trait GraphicsContext {
    /// Set the window-space viewport
    fn set_viewport(&mut self, viewport: &Viewport);

    /// Clear the buffers in `mask`
    fn clear(&mut self, mask: ClearMask, color: [f32; 4]);

    /// Load a projection matrix
    fn load_projection(&mut self, projection: &Mat4d);

    /// Load a model-view matrix
    fn load_model_view(&mut self, model_view: &Mat4d);

    /// Apply graphics state; `None` restores the default state
    fn apply_state(&mut self, state: Option<&StateSet>);

    /// Draw a drawable with the current state and matrices
    fn draw(&mut self, drawable: DrawableId);
}

/// One recorded graphics call
#[derive(Debug, Clone, PartialEq)]
pub enum GraphicsCommand {
    /// [`GraphicsContext::set_viewport`]
    Viewport(Viewport),
    /// [`GraphicsContext::clear`]
    Clear {
        /// Buffers cleared
        mask: ClearMask,
        /// Clear color
        color: [f32; 4],
    },
    /// [`GraphicsContext::load_projection`]
    LoadProjection(Mat4d),
    /// [`GraphicsContext::load_model_view`]
    LoadModelView(Mat4d),
    /// [`GraphicsContext::apply_state`], by state name
    ApplyState(Option<String>),
    /// [`GraphicsContext::draw`]
    Draw(DrawableId),
}

/// Context that records every call
#[derive(Debug, Default, Clone)]
pub struct RecordingContext {
    commands: Vec<GraphicsCommand>,
}

impl RecordingContext {
    /// Empty recording
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls recorded so far
    pub fn commands(&self) -> &[GraphicsCommand] {
        &self.commands
    }

    /// Take the recording, leaving the context empty
    pub fn take_commands(&mut self) -> Vec<GraphicsCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Drawables in draw order
    pub fn draw_sequence(&self) -> Vec<DrawableId> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                GraphicsCommand::Draw(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// Number of recorded calls of the projection-load kind
    pub fn projection_loads(&self) -> usize {
        self.commands
            .iter()
            .filter(|command| matches!(command, GraphicsCommand::LoadProjection(_)))
            .count()
    }
}

impl GraphicsContext for RecordingContext {
    fn set_viewport(&mut self, viewport: &Viewport) {
        self.commands.push(GraphicsCommand::Viewport(*viewport));
    }

    fn clear(&mut self, mask: ClearMask, color: [f32; 4]) {
        self.commands.push(GraphicsCommand::Clear { mask, color });
    }

    fn load_projection(&mut self, projection: &Mat4d) {
        self.commands.push(GraphicsCommand::LoadProjection(*projection));
    }

    fn load_model_view(&mut self, model_view: &Mat4d) {
        self.commands.push(GraphicsCommand::LoadModelView(*model_view));
    }

    fn apply_state(&mut self, state: Option<&StateSet>) {
        self.commands
            .push(GraphicsCommand::ApplyState(state.map(|s| s.name.clone())));
    }

    fn draw(&mut self, drawable: DrawableId) {
        self.commands.push(GraphicsCommand::Draw(drawable));
    }
}
