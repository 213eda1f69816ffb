//! Domain module - catalog entities and collaborator contracts
//!
//! This module contains the site, channel and product entities plus the
//! traits the ingestion core uses to reach the outside world.

pub mod fetch;
pub mod product;
pub mod repositories;
pub mod site;

// Re-export commonly used items
pub use fetch::{FetchError, FetchGateway, FetchMode, FetchResponse};
pub use product::{
    ImageFiles, NormalizedProduct, Product, ProductFields, RawProductRecord, STATUS_BLOCKED,
    STATUS_GONE, STATUS_LIVE,
};
pub use repositories::{
    BlobStore, CatalogStore, ScraperControl, SiteRepository, StoreError, StoreResult,
};
pub use site::{ChannelKey, Gender, ScraperRecord, Site, SiteDefinition, SiteType};
