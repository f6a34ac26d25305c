use std::sync::Arc;
use std::time::Duration;

use crate::services::{RecommendationEngine, RequestContext};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RecommendationEngine>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(engine: Arc<RecommendationEngine>, request_timeout: Duration) -> Self {
        Self {
            engine,
            request_timeout,
        }
    }

    /// Fresh deadline for one engine call
    pub fn request_context(&self) -> RequestContext {
        RequestContext::with_timeout(self.request_timeout)
    }
}
