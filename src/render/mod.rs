//! Render reconciliation and the surfaces edits are applied to.

pub mod channel;
pub mod edit;
pub mod reconciler;
pub mod terminal;
pub mod view;

pub use channel::{ChannelSurface, RenderEvent};
pub use edit::RenderEdit;
pub use reconciler::{RenderState, SummaryDisplay, reconcile};
pub use terminal::TerminalSurface;
pub use view::{Card, SummaryBlock, VisibleView};

/// Errors raised while applying edits to a surface.
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Surface closed")]
    Closed,
}

/// Anything the reconciler's edits can be applied to.
///
/// Implementations only mutate what they display; all bookkeeping about what
/// has been rendered lives in [`RenderState`].
pub trait RenderSurface {
    fn apply(&mut self, edit: &RenderEdit) -> Result<(), SurfaceError>;

    /// Show a terminal failure marker. Already-rendered content stays.
    fn fail(&mut self, message: &str) -> Result<(), SurfaceError>;
}

impl<S: RenderSurface + ?Sized> RenderSurface for &mut S {
    fn apply(&mut self, edit: &RenderEdit) -> Result<(), SurfaceError> {
        (**self).apply(edit)
    }

    fn fail(&mut self, message: &str) -> Result<(), SurfaceError> {
        (**self).fail(message)
    }
}
