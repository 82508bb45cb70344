use std::sync::Arc;

use crate::analysis::Analyzer;
use crate::workflow::store::SessionStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Process-local session store; nothing survives a restart.
    pub sessions: SessionStore,
    /// Pluggable analyzer seam. Production: `GeminiClient`. Tests swap in fakes.
    pub analyzer: Arc<dyn Analyzer>,
}
