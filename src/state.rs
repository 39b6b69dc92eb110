use std::sync::Arc;

use crate::engine::{AssignmentEngine, LocationPipeline, RiderDirectory};
use crate::observability::Metrics;
use crate::realtime::Hub;
use crate::store::memory::MemoryStore;

pub struct AppState {
    pub directory: Arc<RiderDirectory>,
    pub assignments: Arc<AssignmentEngine>,
    pub tracking: Arc<LocationPipeline>,
    pub hub: Arc<Hub>,
    pub metrics: Metrics,
    pub rejection_history_limit: usize,
}

impl AppState {
    pub fn new(event_buffer_size: usize, rejection_history_limit: usize) -> Self {
        let store = Arc::new(MemoryStore::new());
        let metrics = Metrics::new();
        let hub = Arc::new(Hub::new(event_buffer_size));
        let directory = Arc::new(RiderDirectory::new(store.clone()));

        let assignments = Arc::new(AssignmentEngine::new(
            store.clone(),
            store.clone(),
            directory.clone(),
            hub.clone(),
            metrics.clone(),
        ));
        let tracking = Arc::new(LocationPipeline::new(
            store.clone(),
            store,
            directory.clone(),
            hub.clone(),
            metrics.clone(),
        ));

        Self {
            directory,
            assignments,
            tracking,
            hub,
            metrics,
            rejection_history_limit,
        }
    }
}
