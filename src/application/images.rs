//! Product image mirroring
//!
//! Each image is stored under a content address of its source URL, so a
//! re-scrape of an unchanged product never downloads the image again.

use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::domain::fetch::{FetchError, FetchGateway, FetchMode};
use crate::domain::product::{ImageFiles, NormalizedProduct};
use crate::domain::repositories::BlobStore;

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("image {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("image {url} returned an empty body")]
    Empty { url: String },

    #[error("failed to store image blob: {0}")]
    Blob(#[from] std::io::Error),
}

/// Blob name for an image URL: `<blake3 hex>.jpg`
pub fn blob_name(url: &str) -> String {
    format!("{}.jpg", blake3::hash(url.as_bytes()).to_hex())
}

#[derive(Clone)]
pub struct ImageMirror {
    gateway: Arc<dyn FetchGateway>,
    blobs: Arc<dyn BlobStore>,
}

impl ImageMirror {
    pub fn new(gateway: Arc<dyn FetchGateway>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { gateway, blobs }
    }

    /// Make sure both images of `product` are in the blob store
    pub async fn mirror(&self, product: &NormalizedProduct) -> Result<ImageFiles, MirrorError> {
        let image_filename = self.mirror_one(&product.image_url).await?;
        let hq_image_filename = self.mirror_one(&product.hq_image_url).await?;
        Ok(ImageFiles {
            image_filename,
            hq_image_filename,
        })
    }

    async fn mirror_one(&self, url: &str) -> Result<String, MirrorError> {
        let name = blob_name(url);
        if self.blobs.exists(&name).await? {
            debug!(url, blob = %name, "Image already mirrored");
            return Ok(name);
        }

        let response = self.gateway.fetch(url, FetchMode::Direct).await?;
        if !response.is_ok() {
            return Err(MirrorError::Status {
                url: url.to_string(),
                status: response.status,
            });
        }
        if response.body.is_empty() {
            return Err(MirrorError::Empty { url: url.to_string() });
        }

        self.blobs.write(&name, &response.body).await?;
        debug!(url, blob = %name, bytes = response.body.len(), "Image mirrored");
        Ok(name)
    }
}
