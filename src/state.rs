use std::sync::Arc;

use axum::extract::FromRef;

use crate::config::Config;
use crate::store::ForumStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ForumStore>,
    pub config: Config,
}

impl AppState {
    pub fn new(store: Arc<dyn ForumStore>, config: Config) -> Self {
        Self { store, config }
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
