use bytes::Bytes;
use serde_json::json;
use tokio::sync::mpsc;

use crate::render::{RenderEdit, RenderSurface, SurfaceError};

/// An edit, failure or end marker forwarded to another task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    Edit(RenderEdit),
    Failed(String),
    /// The final pass ran; nothing follows.
    Done,
}

impl RenderEvent {
    /// Encode as a server-sent event.
    pub fn to_sse(&self) -> Bytes {
        let (event, data) = match self {
            RenderEvent::Edit(edit) => (
                "edit",
                serde_json::to_string(edit).unwrap_or_else(|_| "{}".to_string()),
            ),
            RenderEvent::Failed(message) => ("error", json!({ "error": message }).to_string()),
            RenderEvent::Done => ("done", "{}".to_string()),
        };
        Bytes::from(format!("event: {}\ndata: {}\n\n", event, data))
    }
}

/// Surface that forwards everything into a channel, e.g. towards an HTTP
/// response body.
pub struct ChannelSurface {
    tx: mpsc::UnboundedSender<RenderEvent>,
}

impl ChannelSurface {
    pub fn new(tx: mpsc::UnboundedSender<RenderEvent>) -> Self {
        Self { tx }
    }
}

impl RenderSurface for ChannelSurface {
    fn apply(&mut self, edit: &RenderEdit) -> Result<(), SurfaceError> {
        self.tx
            .send(RenderEvent::Edit(edit.clone()))
            .map_err(|_| SurfaceError::Closed)
    }

    fn fail(&mut self, message: &str) -> Result<(), SurfaceError> {
        self.tx
            .send(RenderEvent::Failed(message.to_string()))
            .map_err(|_| SurfaceError::Closed)
    }
}
