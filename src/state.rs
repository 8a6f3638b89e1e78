//! Shared application state.

use crate::executor::Executor;

/// State handed to every HTTP handler.
#[derive(Clone)]
pub struct AppState {
    pub executor: Executor,
}

impl AppState {
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }
}
