use std::sync::Arc;

use crate::pipeline::batch::{BatchCoordinator, BatchDispatcher};

/// Shared state for every route.
#[derive(Clone)]
pub struct ApiContext {
    pub dispatcher: Arc<BatchDispatcher>,
}

impl ApiContext {
    pub fn new(dispatcher: Arc<BatchDispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn coordinator(&self) -> &Arc<BatchCoordinator> {
        self.dispatcher.coordinator()
    }
}
