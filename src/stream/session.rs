use std::sync::Arc;

use tracing::trace;

use crate::extractor::Extractor;
use crate::render::{RenderState, RenderSurface, SurfaceError, reconcile};

/// Buffer and render state for a single response.
///
/// Each payload triggers exactly one parse-and-reconcile pass. `finish` and
/// `fail` consume the session, so nothing carries over into the next
/// response.
pub struct RenderSession<S: RenderSurface> {
    extractor: Arc<Extractor>,
    buffer: String,
    state: RenderState,
    surface: S,
}

impl<S: RenderSurface> RenderSession<S> {
    pub fn new(extractor: Arc<Extractor>, surface: S) -> Self {
        Self {
            extractor,
            buffer: String::new(),
            state: RenderState::new(),
            surface,
        }
    }

    /// Append one payload and reconcile. Empty payloads are ignored.
    pub fn push(&mut self, payload: &str) -> Result<(), SurfaceError> {
        if payload.is_empty() {
            return Ok(());
        }
        self.buffer.push_str(payload);
        self.pass(false)
    }

    /// Run the final pass and hand back the surface.
    pub fn finish(mut self) -> Result<S, SurfaceError> {
        self.pass(true)?;
        Ok(self.surface)
    }

    /// Surface a terminal failure without a final pass; whatever was
    /// rendered stays as it is.
    pub fn fail(mut self, message: &str) -> Result<S, SurfaceError> {
        self.surface.fail(message)?;
        Ok(self.surface)
    }

    /// Abandon the response without touching the surface again.
    pub fn into_surface(self) -> S {
        self.surface
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    fn pass(&mut self, is_final: bool) -> Result<(), SurfaceError> {
        let extraction = self
            .extractor
            .extract(&self.buffer, self.state.rendered_count);
        let edits = reconcile(&extraction, &mut self.state, is_final);

        trace!(
            buffer_len = self.buffer.len(),
            rendered = self.state.rendered_count,
            edits = edits.len(),
            is_final,
            "Reconciled buffer"
        );

        for edit in &edits {
            self.surface.apply(edit)?;
        }
        Ok(())
    }
}
