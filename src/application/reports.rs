//! Read-only catalog reports for operators

use chrono::{DateTime, Duration, Utc};

use crate::domain::repositories::{CatalogStore, ScraperControl, StoreResult};
use crate::domain::site::ScraperRecord;

/// Channels that never ran or have not run since `older_than`
pub async fn stale_channels(
    scrapers: &dyn ScraperControl,
    older_than: DateTime<Utc>,
) -> StoreResult<Vec<ScraperRecord>> {
    Ok(scrapers
        .list_scrapers()
        .await?
        .into_iter()
        .filter(|record| record.is_stale(older_than))
        .collect())
}

/// Products a site contributed since the start of `now`'s UTC day
pub async fn inserted_today(catalog: &dyn CatalogStore, site_name: &str, now: DateTime<Utc>) -> StoreResult<i64> {
    let start = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map_or(now, |midnight| midnight.and_utc());
    catalog
        .count_inserted_between(site_name, start, start + Duration::days(1))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::ProductFields;
    use crate::domain::repositories::SiteRepository;
    use crate::infrastructure::catalog_repository::{SqliteProductRepository, SqliteSiteRepository};
    use crate::infrastructure::adapters::all_adapters;
    use crate::test_utils::TestDatabase;
    use chrono::TimeZone;

    #[tokio::test]
    async fn reports_stale_channels_and_daily_counts() {
        let db = TestDatabase::new().await.unwrap();
        let sites = SqliteSiteRepository::new(db.pool());
        let products = SqliteProductRepository::new(db.pool());

        let adapters = all_adapters();
        let fresh = sites.ensure_site(&adapters[0].definition).await.unwrap();
        sites.ensure_site(&adapters[1].definition).await.unwrap();

        let now = Utc.with_ymd_and_hms(2024, 5, 10, 15, 0, 0).unwrap();
        sites.touch_last_scraped(&adapters[0].channel_key(), now).await.unwrap();

        let stale = stale_channels(&sites, now - Duration::hours(48)).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].channel, adapters[1].channel_key());

        for (i, at) in [now, now - Duration::hours(2), now - Duration::days(1)].into_iter().enumerate() {
            let fields = ProductFields {
                title: "Top".into(),
                price: "$1".into(),
                sale_price: None,
                image_filename: Some("a.jpg".into()),
                hq_image_filename: Some("a.jpg".into()),
                product_link: format!("https://fashionbunker.com/products/{i}"),
                site_id: fresh.id,
            };
            products.create(&fields, at).await.unwrap();
        }
        assert_eq!(inserted_today(&products, &fresh.name, now).await.unwrap(), 2);
    }
}
