use std::sync::Arc;

use crate::config::{LimitsConfig, ServerConfig};
use crate::extractor::Extractor;
use crate::rate_limit::FixedWindowLimiter;
use crate::upstream::ChatClient;

/// Shared, read-only state handed to every request handler.
///
/// Everything is built once at startup. The limiter is the only part with
/// interior mutability.
#[derive(Debug, Clone)]
pub struct AppState {
    pub client: ChatClient,
    pub extractor: Arc<Extractor>,
    pub limits: LimitsConfig,
    pub limiter: Arc<FixedWindowLimiter>,
    pub max_payload_size: usize,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> anyhow::Result<Self> {
        let client = ChatClient::new(&config.upstream, &config.tags)?;
        let extractor = Arc::new(Extractor::new(config.tags.clone())?);
        let limiter = Arc::new(FixedWindowLimiter::from_config(&config.rate_limit));

        Ok(Self {
            client,
            extractor,
            limits: config.limits.clone(),
            limiter,
            max_payload_size: config.max_payload_size,
        })
    }
}
