//! Shared process state handed to every handler: the resolved config, the
//! outbound HTTP client, and the worker registry C9–C11 dispatch against.

use std::sync::Arc;

use crate::config::Config;
use crate::worker::WorkerRegistry;

pub struct AppState {
    pub config: Config,
    pub http_client: reqwest::Client,
    pub registry: WorkerRegistry,
}

impl AppState {
    pub fn new(config: Config) -> Arc<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .expect("reqwest client configuration is valid");
        let registry = WorkerRegistry::single(config.upstream_url.clone());
        Arc::new(Self { config, http_client, registry })
    }
}
