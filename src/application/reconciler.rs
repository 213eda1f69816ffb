//! Catalog reconciliation: insert-or-update keyed by the canonical product link
//!
//! Status is never written here. A listing scrape can neither retire a
//! product nor bring a retired one back; only the link-health sweep does that.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::domain::product::ProductFields;
use crate::domain::repositories::{CatalogStore, StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Inserted(i64),
    Updated(i64),
}

#[derive(Clone)]
pub struct CatalogReconciler {
    store: Arc<dyn CatalogStore>,
}

impl CatalogReconciler {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    pub async fn reconcile(&self, fields: &ProductFields) -> StoreResult<ReconcileOutcome> {
        self.reconcile_at(fields, Utc::now()).await
    }

    pub async fn reconcile_at(&self, fields: &ProductFields, now: DateTime<Utc>) -> StoreResult<ReconcileOutcome> {
        if let Some(existing) = self.store.find_by_link(&fields.product_link).await? {
            self.store.update(existing.id, fields, now).await?;
            return Ok(ReconcileOutcome::Updated(existing.id));
        }

        match self.store.create(fields, now).await {
            Ok(product) => Ok(ReconcileOutcome::Inserted(product.id)),
            Err(StoreError::DuplicateLink(link)) => {
                // Lost an insert race for this link; the other writer's row wins and is refreshed
                debug!(link = %link, "Duplicate insert, falling back to update");
                let existing = self
                    .store
                    .find_by_link(&link)
                    .await?
                    .ok_or(StoreError::DuplicateLink(link))?;
                self.store.update(existing.id, fields, now).await?;
                Ok(ReconcileOutcome::Updated(existing.id))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::{STATUS_GONE, STATUS_LIVE};
    use crate::domain::repositories::SiteRepository;
    use crate::infrastructure::catalog_repository::{SqliteProductRepository, SqliteSiteRepository};
    use crate::test_utils::{TestDatabase, sample_definition};
    use chrono::Duration;

    async fn setup() -> (TestDatabase, Arc<SqliteProductRepository>, i64) {
        let db = TestDatabase::new().await.unwrap();
        let site = SqliteSiteRepository::new(db.pool())
            .ensure_site(&sample_definition())
            .await
            .unwrap();
        let products = Arc::new(SqliteProductRepository::new(db.pool()));
        (db, products, site.id)
    }

    fn fields(link: &str, price: &str, site_id: i64) -> ProductFields {
        ProductFields {
            title: "Wrap Skirt".into(),
            price: price.into(),
            sale_price: None,
            image_filename: Some("s.jpg".into()),
            hq_image_filename: Some("l.jpg".into()),
            product_link: link.into(),
            site_id,
        }
    }

    #[tokio::test]
    async fn reconcile_twice_is_idempotent() {
        let (_db, products, site_id) = setup().await;
        let reconciler = CatalogReconciler::new(products.clone());
        let t0 = Utc::now();
        let record = fields("https://shop.test/p/skirt", "$30", site_id);

        let first = reconciler.reconcile_at(&record, t0).await.unwrap();
        let second = reconciler
            .reconcile_at(&record, t0 + Duration::seconds(1))
            .await
            .unwrap();

        let ReconcileOutcome::Inserted(id) = first else {
            panic!("expected insert, got {first:?}");
        };
        assert_eq!(second, ReconcileOutcome::Updated(id));

        let rows = products.list_page(0, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].product_link, "https://shop.test/p/skirt");
        assert_eq!(rows[0].inserted_at, t0);
        assert_eq!(rows[0].updated_at, t0 + Duration::seconds(1));
    }

    #[tokio::test]
    async fn rescrape_never_touches_status() {
        let (_db, products, site_id) = setup().await;
        let reconciler = CatalogReconciler::new(products.clone());
        let t0 = Utc::now();

        let ReconcileOutcome::Inserted(id) = reconciler
            .reconcile_at(&fields("https://shop.test/p/a", "$30", site_id), t0)
            .await
            .unwrap()
        else {
            panic!("expected insert");
        };
        products.update_status(id, STATUS_GONE, t0).await.unwrap();

        reconciler
            .reconcile_at(&fields("https://shop.test/p/a", "$25", site_id), t0 + Duration::seconds(1))
            .await
            .unwrap();

        let row = products.find_by_link("https://shop.test/p/a").await.unwrap().unwrap();
        assert_eq!(row.price, "$25");
        assert_eq!(row.status, STATUS_GONE);
        assert_ne!(row.status, STATUS_LIVE);
    }

    #[tokio::test]
    async fn concurrent_same_link_yields_one_row() {
        let (_db, products, site_id) = setup().await;
        let reconciler = CatalogReconciler::new(products.clone());
        let record = fields("https://shop.test/p/race", "$30", site_id);

        let (a, b) = tokio::join!(reconciler.reconcile(&record), reconciler.reconcile(&record));
        a.unwrap();
        b.unwrap();

        assert_eq!(products.list_page(0, 10).await.unwrap().len(), 1);
    }
}
