//! # Web API Application State

use crate::config::WebConfig;
use crate::orchestration::BatchRunner;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct AppState {
    pub runner: Arc<BatchRunner>,
    pub config: Arc<WebConfig>,
}

impl AppState {
    pub fn new(runner: Arc<BatchRunner>, config: WebConfig) -> Self {
        Self {
            runner,
            config: Arc::new(config),
        }
    }
}
