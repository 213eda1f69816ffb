//! Test utilities
//!
//! In-memory database, a scripted fetch gateway, an in-memory blob store and
//! a small fake site adapter, so tests never touch the network or the disk.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use crate::application::{AdapterRegistry, IngestContext};
use crate::domain::fetch::{FetchError, FetchGateway, FetchMode, FetchResponse};
use crate::domain::product::RawProductRecord;
use crate::domain::repositories::BlobStore;
use crate::domain::site::{Gender, SiteDefinition, SiteType};
use crate::infrastructure::adapters::SiteAdapter;
use crate::infrastructure::parsing::{
    ParseContext, ParsedListing, ParsingResult, attr_of, compile, text_of,
};
use crate::infrastructure::{AppConfig, DatabaseConnection, SqliteProductRepository, SqliteSiteRepository};

/// Test database configuration
pub struct TestDatabase {
    pub connection: DatabaseConnection,
}

impl TestDatabase {
    /// Fresh, migrated in-memory database; every instance is isolated
    pub async fn new() -> Result<Self> {
        let db = DatabaseConnection::in_memory().await?;
        db.migrate().await?;
        Ok(Self { connection: db })
    }

    /// Get the database pool for use in repositories
    pub fn pool(&self) -> sqlx::Pool<sqlx::Sqlite> {
        self.connection.pool().clone()
    }
}

pub fn sample_definition() -> SiteDefinition {
    fake_adapter().definition
}

/// Fetch gateway answering from a script; unscripted URLs fail with a network error
#[derive(Default)]
pub struct ScriptedGateway {
    responses: Mutex<HashMap<String, Result<FetchResponse, FetchError>>>,
    requests: Mutex<Vec<(String, FetchMode)>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, response: FetchResponse) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(url.to_string(), Ok(response));
        }
    }

    pub fn fail(&self, url: &str, error: FetchError) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(url.to_string(), Err(error));
        }
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests
            .lock()
            .map(|requests| requests.iter().filter(|(u, _)| u == url).count())
            .unwrap_or_default()
    }

    pub fn total_requests(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }
}

#[async_trait]
impl FetchGateway for ScriptedGateway {
    async fn fetch(&self, url: &str, mode: FetchMode) -> Result<FetchResponse, FetchError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((url.to_string(), mode));
        }
        let scripted = self
            .responses
            .lock()
            .ok()
            .and_then(|responses| responses.get(url).cloned());
        scripted.unwrap_or_else(|| {
            Err(FetchError::Network {
                url: url.to_string(),
                message: "unscripted url".to_string(),
            })
        })
    }
}

/// Blob store kept in memory
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn contains(&self, filename: &str) -> bool {
        self.blobs
            .lock()
            .map(|blobs| blobs.contains_key(filename))
            .unwrap_or_default()
    }

    pub fn remove(&self, filename: &str) {
        if let Ok(mut blobs) = self.blobs.lock() {
            blobs.remove(filename);
        }
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().map(|blobs| blobs.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> io::Error {
    io::Error::other("blob store lock poisoned")
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn exists(&self, filename: &str) -> io::Result<bool> {
        Ok(self.blobs.lock().map_err(|_| poisoned())?.contains_key(filename))
    }

    async fn delete(&self, filename: &str) -> io::Result<bool> {
        Ok(self.blobs.lock().map_err(|_| poisoned())?.remove(filename).is_some())
    }

    async fn write(&self, filename: &str, bytes: &[u8]) -> io::Result<()> {
        self.blobs
            .lock()
            .map_err(|_| poisoned())?
            .insert(filename.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// Minimal direct-fetch adapter for `https://shop.test`
pub fn fake_adapter() -> SiteAdapter {
    SiteAdapter {
        definition: SiteDefinition {
            name: "Testshop",
            display_name: "Test Shop",
            scrape_url: "https://shop.test/list",
            host: "shop.test",
            gender: Gender::Women,
            site_type: SiteType::Sale,
            description: None,
        },
        listing_url: |page| format!("https://shop.test/list?page={page}"),
        default_pages: 1..=2,
        listing_mode: FetchMode::Direct,
        health_mode: FetchMode::Direct,
        parser: parse_fake_listing,
        dead_marker: |content| content.contains("Sold out"),
    }
}

fn parse_fake_listing(content: &str, context: &ParseContext) -> ParsingResult<ParsedListing> {
    let document = scraper::Html::parse_document(content);
    let tile = compile(".tile")?;
    let title = compile(".title")?;
    let price = compile(".price")?;
    let image = compile("img")?;
    let link = compile("a")?;

    let mut listing = ParsedListing::default();
    for element in document.select(&tile) {
        listing.accept(
            RawProductRecord {
                title: text_of(&element, &title),
                price: text_of(&element, &price),
                sale_price: None,
                image_urls: attr_of(&element, &image, "src").into_iter().collect(),
                product_link: attr_of(&element, &link, "href"),
            },
            context,
        );
    }
    Ok(listing)
}

/// Listing page for the fake adapter; product `T` links to `/p/T` with image `/img/T.jpg`
pub fn listing_html(items: &[(&str, &str)]) -> Vec<u8> {
    let tiles: String = items
        .iter()
        .map(|(title, price)| {
            format!(
                r#"<div class="tile"><a href="/p/{title}"></a><img src="https://shop.test/img/{title}.jpg"><span class="title">{title}</span><span class="price">{price}</span></div>"#
            )
        })
        .collect();
    format!("<html><body>{tiles}</body></html>").into_bytes()
}

pub fn image_url(title: &str) -> String {
    format!("https://shop.test/img/{title}.jpg")
}

pub fn product_link(title: &str) -> String {
    format!("https://shop.test/p/{title}")
}

/// Everything a channel run or sweep needs, backed by test doubles
pub struct TestHarness {
    pub database: TestDatabase,
    pub config: AppConfig,
    pub gateway: Arc<ScriptedGateway>,
    pub blobs: Arc<MemoryBlobStore>,
    pub products: Arc<SqliteProductRepository>,
    pub sites: Arc<SqliteSiteRepository>,
    pub registry: Arc<AdapterRegistry>,
}

impl TestHarness {
    pub async fn new() -> Self {
        let database = TestDatabase::new().await.expect("Failed to create test database");
        let pool = database.pool();
        Self {
            products: Arc::new(SqliteProductRepository::new(pool.clone())),
            sites: Arc::new(SqliteSiteRepository::new(pool)),
            database,
            config: AppConfig::default(),
            gateway: Arc::new(ScriptedGateway::new()),
            blobs: Arc::new(MemoryBlobStore::default()),
            registry: Arc::new(AdapterRegistry::new([fake_adapter()])),
        }
    }

    pub fn context(&self) -> IngestContext {
        IngestContext {
            config: Arc::new(self.config.clone()),
            registry: self.registry.clone(),
            gateway: self.gateway.clone(),
            catalog: self.products.clone(),
            sites: self.sites.clone(),
            scrapers: self.sites.clone(),
            blobs: self.blobs.clone(),
        }
    }

    /// Script a JPEG body for each product image
    pub fn serve_images(&self, titles: &[&str]) {
        for title in titles {
            self.gateway
                .respond(&image_url(title), FetchResponse::new(200, format!("jpeg:{title}").into_bytes()));
        }
    }
}
