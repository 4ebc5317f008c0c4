//! Route gateway: merges every endpoint subrouter and binds the shared
//! application state. Callers only see [`router`] and [`AppState`].

use std::sync::Arc;

use axum::Router;

use crate::store::ReadingStore;
use crate::tracker::LatestStateTracker;

mod health;
mod ingest;
mod status;

// ---

/// State shared by all handlers.
pub struct AppState<S> {
    pub tracker: Arc<LatestStateTracker>,
    pub store: Arc<S>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        AppState {
            tracker: Arc::clone(&self.tracker),
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ReadingStore> AppState<S> {
    pub fn new(tracker: Arc<LatestStateTracker>, store: S) -> Self {
        AppState {
            tracker,
            store: Arc::new(store),
        }
    }
}

pub fn router<S: ReadingStore>(state: AppState<S>) -> Router {
    // ---
    Router::new()
        .merge(ingest::router())
        .merge(status::router())
        .merge(health::router())
        .with_state(state)
}
