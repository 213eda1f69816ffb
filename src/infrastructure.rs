//! Infrastructure layer: configuration, logging, persistence, fetching, parsing and site adapters
//!
//! Concrete implementations of the domain collaborator traits live here.

pub mod adapters;
pub mod blob_store;
pub mod catalog_repository;
pub mod config;
pub mod database_connection;
pub mod http_client;
pub mod logging;
pub mod parsing;
pub mod retry_policy;

// Re-export commonly used items
pub use adapters::{SiteAdapter, all_adapters};
pub use blob_store::FsBlobStore;
pub use catalog_repository::{SqliteProductRepository, SqliteSiteRepository};
pub use config::{AppConfig, ConfigError};
pub use database_connection::DatabaseConnection;
pub use http_client::{HttpFetchGateway, unwrap_proxy_url};
pub use logging::{init_logging, init_logging_with_config};
pub use parsing::{ParseContext, ParsedListing, ParsingError, ParsingResult};
pub use retry_policy::RetryPolicy;
