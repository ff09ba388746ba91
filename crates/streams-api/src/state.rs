use std::sync::Arc;

use streams_core::Lister;

#[derive(Clone)]
pub struct AppState {
    pub lister: Arc<Lister>,
}

impl AppState {
    pub fn new(lister: Lister) -> Self {
        Self {
            lister: Arc::new(lister),
        }
    }
}
