use std::sync::Arc;

use axum::extract::FromRef;

use crate::{config::Config, repository::AttemptRepository};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn AttemptRepository>,
    pub config: Config,
}

impl FromRef<AppState> for Arc<dyn AttemptRepository> {
    fn from_ref(state: &AppState) -> Self {
        state.repo.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
