use std::fmt;

use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::render::{RenderSurface, SurfaceError};
use crate::stream::session::RenderSession;
use crate::stream::sse::{DONE_PAYLOAD, SseLineDecoder};

/// How a consumption loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Transport ended normally and the final pass ran.
    Completed,
    /// Transport failed mid-stream; rendered content was left frozen.
    Failed(String),
    /// Abandoned by the caller; no further passes ran.
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("Render surface error: {0}")]
    Surface(#[from] SurfaceError),
}

/// Caller side of a cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Loop side of a cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled. Never resolves if the handle is dropped
    /// without cancelling.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

async fn wait_cancelled(signal: &mut Option<CancelSignal>) {
    match signal {
        Some(signal) => signal.cancelled().await,
        None => std::future::pending::<()>().await,
    }
}

/// Drive `session` from a transport byte stream until it ends, fails or is
/// cancelled.
///
/// The only suspension point is waiting for the next increment; parsing and
/// reconciliation run inline on every payload.
pub async fn consume<St, B, E, S>(
    mut transport: St,
    mut session: RenderSession<S>,
    mut cancel: Option<CancelSignal>,
) -> Result<(StreamOutcome, S), StreamError>
where
    St: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: fmt::Display,
    S: RenderSurface,
{
    let mut decoder = SseLineDecoder::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = wait_cancelled(&mut cancel) => {
                debug!(buffer_len = session.buffer().len(), "Stream consumption cancelled");
                return Ok((StreamOutcome::Cancelled, session.into_surface()));
            }
            item = transport.next() => item,
        };

        match next {
            Some(Ok(increment)) => {
                for payload in decoder.feed(increment.as_ref()) {
                    if payload == DONE_PAYLOAD {
                        continue;
                    }
                    session.push(&payload)?;
                }
            }
            Some(Err(e)) => {
                let message = e.to_string();
                warn!(error = %message, "Transport failed mid-stream");
                let surface = session.fail(&message)?;
                return Ok((StreamOutcome::Failed(message), surface));
            }
            None => {
                for payload in decoder.finish() {
                    if payload != DONE_PAYLOAD {
                        session.push(&payload)?;
                    }
                }
                debug!(
                    buffer_len = session.buffer().len(),
                    rendered = session.state().rendered_count,
                    "Transport finished"
                );
                let surface = session.finish()?;
                return Ok((StreamOutcome::Completed, surface));
            }
        }
    }
}
