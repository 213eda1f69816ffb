//! Storage-integrity sweep: drop products whose image file is gone

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::application::context::IngestContext;
use crate::application::errors::IngestResult;
use crate::domain::product::Product;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupSummary {
    pub scanned: usize,
    pub deleted: usize,
    pub blobs_removed: usize,
    pub failures: usize,
    pub cancelled: bool,
}

pub struct ImageCleanup {
    context: IngestContext,
}

impl ImageCleanup {
    pub fn new(context: IngestContext) -> Self {
        Self { context }
    }

    pub async fn run(&self, cancel: &CancellationToken) -> IngestResult<CleanupSummary> {
        self.run_inner(cancel).instrument(info_span!("image_cleanup")).await
    }

    async fn run_inner(&self, cancel: &CancellationToken) -> IngestResult<CleanupSummary> {
        let page_size = self.context.config.crawling.store_page_size.max(1);
        let mut summary = CleanupSummary::default();
        let mut after_id = 0;

        loop {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let batch = self.context.catalog.list_page(after_id, page_size).await?;
            let Some(last) = batch.last() else {
                break;
            };
            after_id = last.id;

            for product in &batch {
                summary.scanned += 1;
                self.sweep_one(product, &mut summary).await;
            }
        }

        info!(
            scanned = summary.scanned,
            deleted = summary.deleted,
            blobs_removed = summary.blobs_removed,
            "Image cleanup finished"
        );
        Ok(summary)
    }

    async fn sweep_one(&self, product: &Product, summary: &mut CleanupSummary) {
        let present = match product.image_filename.as_deref() {
            None => false,
            Some(name) => match self.context.blobs.exists(name).await {
                Ok(present) => present,
                Err(e) => {
                    warn!(product_id = product.id, blob = name, error = %e, "Could not check image blob");
                    summary.failures += 1;
                    return;
                }
            },
        };
        if present {
            return;
        }

        if let Err(e) = self.context.catalog.delete(product.id).await {
            error!(product_id = product.id, error = %e, "Failed to delete product without image");
            summary.failures += 1;
            return;
        }
        summary.deleted += 1;
        info!(product_id = product.id, link = %product.product_link, "Deleted product whose image is missing");

        // Blobs are named by source URL, so another row may still use one
        let mut blobs: Vec<&str> = product.image_blobs().collect();
        blobs.dedup();
        for blob in blobs {
            match self.context.catalog.count_image_references(blob).await {
                Ok(0) => {}
                Ok(references) => {
                    debug!(product_id = product.id, blob, references, "Image blob still referenced, keeping it");
                    continue;
                }
                Err(e) => {
                    warn!(product_id = product.id, blob, error = %e, "Could not check image blob references, keeping it");
                    summary.failures += 1;
                    continue;
                }
            }
            match self.context.blobs.delete(blob).await {
                Ok(true) => summary.blobs_removed += 1,
                Ok(false) => warn!(product_id = product.id, blob, "Image blob already missing"),
                Err(e) => warn!(product_id = product.id, blob, error = %e, "Failed to delete image blob"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::ProductFields;
    use crate::domain::repositories::{BlobStore, CatalogStore, SiteRepository};
    use crate::test_utils::{TestHarness, sample_definition};
    use chrono::Utc;

    fn fields(link: &str, image: &str, hq_image: &str, site_id: i64) -> ProductFields {
        ProductFields {
            title: "Linen Shirt".into(),
            price: "$48.00".into(),
            sale_price: None,
            image_filename: Some(image.into()),
            hq_image_filename: Some(hq_image.into()),
            product_link: link.into(),
            site_id,
        }
    }

    #[tokio::test]
    async fn shared_blobs_survive_deleting_one_owner() {
        let harness = TestHarness::new().await;
        let site = harness.sites.ensure_site(&sample_definition()).await.unwrap();
        let now = Utc::now();

        // First product lost its standard image; its high-res blob is the second product's standard image
        harness
            .products
            .create(&fields("https://shop.test/p/a", "a_missing.jpg", "shared.jpg", site.id), now)
            .await
            .unwrap();
        harness
            .products
            .create(&fields("https://shop.test/p/b", "shared.jpg", "b_hq.jpg", site.id), now)
            .await
            .unwrap();
        harness.blobs.write("shared.jpg", b"jpeg").await.unwrap();
        harness.blobs.write("b_hq.jpg", b"jpeg").await.unwrap();

        let summary = ImageCleanup::new(harness.context())
            .run(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.scanned, 2);
        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.blobs_removed, 0);
        assert!(harness.blobs.contains("shared.jpg"));
        assert!(harness.products.find_by_link("https://shop.test/p/a").await.unwrap().is_none());
        assert!(harness.products.find_by_link("https://shop.test/p/b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unshared_blobs_go_with_their_row() {
        let harness = TestHarness::new().await;
        let site = harness.sites.ensure_site(&sample_definition()).await.unwrap();
        harness
            .products
            .create(&fields("https://shop.test/p/a", "gone.jpg", "a_hq.jpg", site.id), Utc::now())
            .await
            .unwrap();
        harness.blobs.write("a_hq.jpg", b"jpeg").await.unwrap();

        let summary = ImageCleanup::new(harness.context())
            .run(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.blobs_removed, 1);
        assert!(harness.blobs.is_empty());
    }
}
