use std::sync::Arc;

use cadence_engine::MediaService;

/// Server state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MediaService>,
}

impl AppState {
    pub fn new(service: MediaService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}
