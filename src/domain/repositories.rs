//! Repository interfaces for the catalog
//!
//! Contains trait definitions for the persistent collaborators the ingestion
//! core depends on: the catalog store, sites with their scraper heartbeats,
//! and the image blob store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::product::{Product, ProductFields};
use crate::domain::site::{ChannelKey, ScraperRecord, Site, SiteDefinition};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a product with link {0} already exists")]
    DuplicateLink(String),

    #[error("product {0} not found")]
    NotFound(i64),

    #[error("site for channel {0} not found")]
    SiteNotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_by_link(&self, link: &str) -> StoreResult<Option<Product>>;

    /// Insert a live product; fails with [`StoreError::DuplicateLink`] when the link exists
    async fn create(&self, fields: &ProductFields, at: DateTime<Utc>) -> StoreResult<Product>;

    /// Refresh the scraped fields of an existing row; status is left untouched
    async fn update(&self, id: i64, fields: &ProductFields, at: DateTime<Utc>) -> StoreResult<()>;

    async fn update_status(&self, id: i64, status: i64, at: DateTime<Utc>) -> StoreResult<()>;

    async fn delete(&self, id: i64) -> StoreResult<()>;

    /// Keyset page of products inserted before `older_than`, ordered by id
    async fn list_stale(
        &self,
        older_than: DateTime<Utc>,
        after_id: i64,
        limit: u32,
    ) -> StoreResult<Vec<Product>>;

    /// Keyset page over the whole catalog, ordered by id
    async fn list_page(&self, after_id: i64, limit: u32) -> StoreResult<Vec<Product>>;

    async fn live_products_for_site(&self, site_id: i64) -> StoreResult<Vec<Product>>;

    /// Rows whose standard or high-res image is stored under `filename`
    async fn count_image_references(&self, filename: &str) -> StoreResult<i64>;

    async fn count_inserted_between(
        &self,
        site_name: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<i64>;
}

#[async_trait]
pub trait SiteRepository: Send + Sync {
    /// Upsert the site row for a channel and make sure it has a scraper record
    async fn ensure_site(&self, definition: &SiteDefinition) -> StoreResult<Site>;

    async fn find_site(&self, channel: &ChannelKey) -> StoreResult<Option<Site>>;
}

#[async_trait]
pub trait ScraperControl: Send + Sync {
    /// Heartbeat written at the end of a channel run
    async fn touch_last_scraped(&self, channel: &ChannelKey, at: DateTime<Utc>) -> StoreResult<()>;

    async fn list_scrapers(&self) -> StoreResult<Vec<ScraperRecord>>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn exists(&self, filename: &str) -> std::io::Result<bool>;

    /// Delete a blob; deleting a missing blob is not an error
    async fn delete(&self, filename: &str) -> std::io::Result<bool>;

    async fn write(&self, filename: &str, bytes: &[u8]) -> std::io::Result<()>;
}
