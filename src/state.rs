use std::sync::Arc;

use axum::extract::FromRef;

use crate::{config::Config, session::SessionRegistry, store::Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Config,
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        let sessions = SessionRegistry::new();
        Self {
            store,
            config,
            sessions,
        }
    }
}

impl FromRef<AppState> for Arc<dyn Store> {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for SessionRegistry {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}
