use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status code of a live product
pub const STATUS_LIVE: i64 = 200;
/// Product page is gone (HTTP 404 or a site-specific "no longer available" marker)
pub const STATUS_GONE: i64 = 404;
/// Product page refused access; indeterminate, kept for a later re-check
pub const STATUS_BLOCKED: i64 = 403;

/// Product record as scraped from one listing entry, before normalization
///
/// Fields stay optional so adapters can hand over whatever the markup gave
/// them; completeness is decided by [`RawProductRecord::missing_field`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawProductRecord {
    pub title: Option<String>,
    pub price: Option<String>,
    pub sale_price: Option<String>,
    /// Standard-res first, high-res second when the site offers both
    pub image_urls: Vec<String>,
    /// Absolute or site-relative product page link
    pub product_link: Option<String>,
}

impl RawProductRecord {
    /// First required field that is absent or blank, if any
    pub fn missing_field(&self) -> Option<&'static str> {
        fn blank(value: Option<&String>) -> bool {
            value.is_none_or(|v| v.trim().is_empty())
        }

        if blank(self.title.as_ref()) {
            return Some("title");
        }
        if blank(self.price.as_ref()) {
            return Some("price");
        }
        if self.image_urls.iter().all(|u| u.trim().is_empty()) {
            return Some("image");
        }
        if blank(self.product_link.as_ref()) {
            return Some("product_link");
        }
        None
    }

    pub fn is_complete(&self) -> bool {
        self.missing_field().is_none()
    }
}

/// Canonical product shape handed to the reconciler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedProduct {
    pub title: String,
    /// Display price exactly as the site formats it
    pub price: String,
    pub sale_price: Option<String>,
    pub image_url: String,
    pub hq_image_url: String,
    /// Canonical (absolute) link, the catalog's natural key
    pub product_link: String,
}

/// Image blob names a normalized product was mirrored under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFiles {
    pub image_filename: String,
    pub hq_image_filename: String,
}

/// Fields written on create and refreshed on every re-scrape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductFields {
    pub title: String,
    pub price: String,
    pub sale_price: Option<String>,
    pub image_filename: Option<String>,
    pub hq_image_filename: Option<String>,
    pub product_link: String,
    pub site_id: i64,
}

impl ProductFields {
    pub fn from_normalized(product: &NormalizedProduct, images: &ImageFiles, site_id: i64) -> Self {
        Self {
            title: product.title.clone(),
            price: product.price.clone(),
            sale_price: product.sale_price.clone(),
            image_filename: Some(images.image_filename.clone()),
            hq_image_filename: Some(images.hq_image_filename.clone()),
            product_link: product.product_link.clone(),
            site_id,
        }
    }
}

/// Persisted catalog product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub title: String,
    pub image_filename: Option<String>,
    pub hq_image_filename: Option<String>,
    pub price: String,
    pub sale_price: Option<String>,
    pub product_link: String,
    pub status: i64,
    pub site_id: i64,
    pub inserted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_live(&self) -> bool {
        self.status == STATUS_LIVE
    }

    /// Image blobs owned by this row
    pub fn image_blobs(&self) -> impl Iterator<Item = &str> {
        self.image_filename
            .as_deref()
            .into_iter()
            .chain(self.hq_image_filename.as_deref())
    }
}
