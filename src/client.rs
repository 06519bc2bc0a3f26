//! `omomuki ask`: submit one request to a running server and render the
//! answer in the terminal as it streams in.

use std::io::{IsTerminal, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use tracing::{debug, info};

use crate::extractor::Extractor;
use crate::grammar::TagSet;
use crate::io_struct::AnalyzeRequest;
use crate::render::{RenderSurface, TerminalSurface};
use crate::stream::{RenderSession, StreamOutcome, cancel_pair, consume};

#[derive(Debug, Clone)]
pub struct AskOptions {
    /// Base URL of the server, e.g. `http://127.0.0.1:3000`
    pub server_url: String,
    pub request: AnalyzeRequest,
    /// Must match the tag names the server prompts with
    pub tags: TagSet,
    pub timeout: Duration,
}

/// POST the request to `/api/stream` and consume the reply into `surface`.
///
/// Ctrl-C abandons the stream without another reconcile pass.
pub async fn ask<S: RenderSurface>(
    options: &AskOptions,
    surface: S,
) -> anyhow::Result<(StreamOutcome, S)> {
    let extractor = Arc::new(Extractor::new(options.tags.clone())?);
    let url = format!("{}/api/stream", options.server_url.trim_end_matches('/'));

    let client = reqwest::Client::builder()
        .timeout(options.timeout)
        .build()?;
    let resp = client
        .post(&url)
        .json(&options.request)
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", url))?;

    let status = resp.status();
    if !status.is_success() {
        let body: serde_json::Value = resp.json().await.unwrap_or_default();
        let message = body["error"].as_str().unwrap_or("no error message");
        bail!("Server returned {}: {}", status, message);
    }
    info!(url = %url, "Stream opened");

    let (handle, signal) = cancel_pair();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });

    let session = RenderSession::new(extractor, surface);
    let result = consume(Box::pin(resp.bytes_stream()), session, Some(signal)).await;
    ctrl_c.abort();

    let (outcome, surface) = result?;
    debug!(?outcome, "Stream consumed");
    Ok((outcome, surface))
}

/// Run [`ask`] against stdout and map the outcome to an error for the CLI.
pub async fn ask_to_stdout(options: &AskOptions) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let ansi = stdout.is_terminal();
    let (outcome, surface) = ask(options, TerminalSurface::new(stdout, ansi)).await?;
    surface.into_inner().flush()?;

    match outcome {
        StreamOutcome::Completed => Ok(()),
        StreamOutcome::Cancelled => bail!("Cancelled"),
        StreamOutcome::Failed(message) => bail!("Stream failed: {}", message),
    }
}
