use std::time::Instant;

use actix_web::{App, Error, HttpRequest, HttpResponse, HttpServer, error, get, post, web};
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, warn};

use crate::app_state::AppState;
use crate::config::{ConfigValidator, ServerConfig};
use crate::error::ApiError;
use crate::io_struct::AnalyzeRequest;
use crate::logging;
use crate::middleware::{RateLimitMiddleware, client_ip};
use crate::render::{ChannelSurface, RenderEvent};
use crate::stream::{RenderSession, StreamOutcome, consume};
use crate::upstream::{TextStream, UpstreamError};

const TEXT_PREVIEW_CHARS: usize = 100;

/// Encode one text increment as `data:` records, one per line, closed by a
/// blank line.
pub fn sse_data_record(text: &str) -> Bytes {
    let mut record = String::with_capacity(text.len() + 8);
    for line in text.split('\n') {
        record.push_str("data: ");
        record.push_str(line.trim_end_matches('\r'));
        record.push('\n');
    }
    record.push('\n');
    Bytes::from(record)
}

fn json_error_handler(err: error::JsonPayloadError, _req: &HttpRequest) -> Error {
    match &err {
        error::JsonPayloadError::OverflowKnownLength { length, limit } => {
            warn!(length, limit, "Request body too large");
            ApiError::PayloadTooLarge(format!(
                "{} bytes exceeds limit of {} bytes",
                length, limit
            ))
            .into()
        }
        error::JsonPayloadError::Overflow { limit } => {
            warn!(limit, "Request body too large");
            ApiError::PayloadTooLarge(format!("body exceeds limit of {} bytes", limit)).into()
        }
        _ => ApiError::InvalidInput(format!("Invalid JSON payload: {}", err)).into(),
    }
}

/// Validate, log and open the upstream stream shared by both analysis routes.
async fn open_upstream(
    route: &'static str,
    req: &HttpRequest,
    body: &AnalyzeRequest,
    state: &AppState,
) -> Result<(String, TextStream), ApiError> {
    let ip = client_ip(req);
    if let Err(e) = body.validate(&state.limits) {
        warn!(ip = %ip, route, error = %e, "Rejected request");
        return Err(e);
    }

    let preview = body.text_preview(TEXT_PREVIEW_CHARS).unwrap_or_default();
    info!(
        ip = %ip,
        text = %preview,
        has_image = body.has_image(),
        "{}",
        route
    );

    match state.client.stream_chat(body).await {
        Ok(increments) => {
            info!(ip = %ip, route, "Upstream stream started");
            Ok((ip, increments))
        }
        Err(e) => {
            error!(ip = %ip, route, error = %e, "Upstream request failed");
            Err(e.into())
        }
    }
}

#[get("/health")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().body("Ok")
}

#[post("/stream")]
async fn api_stream(
    req: HttpRequest,
    body: web::Json<AnalyzeRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let started = Instant::now();
    let (ip, mut increments) = open_upstream("POST /api/stream", &req, &body, &state).await?;

    let (tx, rx) = mpsc::unbounded_channel::<Result<Bytes, UpstreamError>>();
    tokio::spawn(async move {
        let mut relayed = 0usize;
        while let Some(item) = increments.next().await {
            match item {
                Ok(text) => {
                    if tx.send(Ok(sse_data_record(&text))).is_err() {
                        debug!(ip = %ip, relayed, "Client went away");
                        return;
                    }
                    relayed += 1;
                }
                Err(e) => {
                    error!(
                        ip = %ip,
                        error = %e,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Upstream stream failed"
                    );
                    let _ = tx.send(Err(e));
                    return;
                }
            }
        }
        info!(
            ip = %ip,
            relayed,
            duration_ms = started.elapsed().as_millis() as u64,
            "Stream completed"
        );
    });

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(UnboundedReceiverStream::new(rx)))
}

#[post("/render")]
async fn api_render(
    req: HttpRequest,
    body: web::Json<AnalyzeRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let started = Instant::now();
    let (ip, increments) = open_upstream("POST /api/render", &req, &body, &state).await?;

    let (tx, rx) = mpsc::unbounded_channel::<RenderEvent>();
    let session = RenderSession::new(state.extractor.clone(), ChannelSurface::new(tx.clone()));
    // Re-encode as records so rendering sees exactly what /api/stream clients see
    let transport = increments.map(|item| item.map(|text| sse_data_record(&text)));

    tokio::spawn(async move {
        let duration_ms = || started.elapsed().as_millis() as u64;
        match consume(transport, session, None).await {
            Ok((StreamOutcome::Completed, _)) => {
                let _ = tx.send(RenderEvent::Done);
                info!(ip = %ip, duration_ms = duration_ms(), "Render completed");
            }
            Ok((StreamOutcome::Failed(message), _)) => {
                error!(ip = %ip, error = %message, duration_ms = duration_ms(), "Render failed");
            }
            Ok((StreamOutcome::Cancelled, _)) => {
                debug!(ip = %ip, "Render cancelled");
            }
            Err(e) => {
                debug!(ip = %ip, error = %e, "Render abandoned");
            }
        }
    });

    let events = UnboundedReceiverStream::new(rx).map(|event| Ok::<_, Error>(event.to_sse()));
    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(events))
}

/// Register routes and per-app configuration; `/api` is rate limited.
pub fn configure(state: web::Data<AppState>) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        let limit = state.max_payload_size;
        let limiter = state.limiter.clone();
        cfg.app_data(state)
            .app_data(
                web::JsonConfig::default()
                    .limit(limit)
                    .error_handler(json_error_handler),
            )
            .app_data(web::PayloadConfig::default().limit(limit))
            .service(health)
            .service(
                web::scope("/api")
                    .service(api_stream)
                    .service(api_render)
                    .wrap(RateLimitMiddleware::new(limiter)),
            );
    }
}

pub async fn startup(config: ServerConfig) -> anyhow::Result<()> {
    let _log_guard = logging::init_logging(config.logging_config());

    ConfigValidator::validate(&config)?;
    let state = web::Data::new(AppState::new(&config)?);

    info!("Upstream endpoint: {}", state.client.endpoint());
    info!(
        "Rate limit: {} requests per {}s",
        config.rate_limit.max_requests, config.rate_limit.window_secs
    );
    info!(
        "Max payload size: {} MB",
        config.max_payload_size / (1024 * 1024)
    );
    info!("Serving on {}:{}", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .configure(configure(state.clone()))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
