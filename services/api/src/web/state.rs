//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use extractor_core::ports::{ChatCompletionStream, ExtractionStore, ProgressStore, UserStore};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all
/// handlers. No per-request state lives here; the database is the only
/// shared mutable resource.
#[derive(Clone)]
pub struct AppState {
    pub extractions: Arc<dyn ExtractionStore>,
    pub progress: Arc<dyn ProgressStore>,
    pub users: Arc<dyn UserStore>,
    pub chat: Arc<dyn ChatCompletionStream>,
    pub config: Arc<Config>,
}
