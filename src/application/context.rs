//! Collaborators shared by the channel runner and the catalog sweeps

use std::sync::Arc;

use crate::application::registry::AdapterRegistry;
use crate::domain::fetch::FetchGateway;
use crate::domain::repositories::{BlobStore, CatalogStore, ScraperControl, SiteRepository};
use crate::infrastructure::config::AppConfig;

#[derive(Clone)]
pub struct IngestContext {
    pub config: Arc<AppConfig>,
    pub registry: Arc<AdapterRegistry>,
    pub gateway: Arc<dyn FetchGateway>,
    pub catalog: Arc<dyn CatalogStore>,
    pub sites: Arc<dyn SiteRepository>,
    pub scrapers: Arc<dyn ScraperControl>,
    pub blobs: Arc<dyn BlobStore>,
}
