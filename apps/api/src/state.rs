use std::sync::Arc;

use crate::config::Config;
use crate::memories::identify::DishIdentifier;
use crate::memories::store::RecordStore;
use crate::services::background::BackgroundRemover;
use crate::services::blob::BlobStore;
use crate::services::places::PlaceSearch;

/// Shared application state injected into all route handlers via Axum extractors.
/// Every collaborator is constructed once in `main` and can be swapped for a fake.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub places: Arc<dyn PlaceSearch>,
    pub background: Arc<dyn BackgroundRemover>,
    pub identifier: Arc<dyn DishIdentifier>,
    pub config: Config,
}
