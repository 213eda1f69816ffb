//! SQLite implementations of the catalog repositories
//!
//! Rows are mapped by hand from `sqlx::Row`. The `products.product_link`
//! unique constraint is the only cross-run consistency guard; a violation on
//! insert surfaces as [`StoreError::DuplicateLink`] so the reconciler can fall
//! back to an update.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

use crate::domain::product::{Product, ProductFields, STATUS_LIVE};
use crate::domain::repositories::{
    CatalogStore, ScraperControl, SiteRepository, StoreError, StoreResult,
};
use crate::domain::site::{ChannelKey, Gender, ScraperRecord, Site, SiteDefinition, SiteType};

const PRODUCT_COLUMNS: &str = "id, title, image_filename, hq_image_filename, price, sale_price, \
     product_link, status, site_id, inserted_at, updated_at";

fn product_from_row(row: &SqliteRow) -> Product {
    Product {
        id: row.get("id"),
        title: row.get("title"),
        image_filename: row.get("image_filename"),
        hq_image_filename: row.get("hq_image_filename"),
        price: row.get("price"),
        sale_price: row.get("sale_price"),
        product_link: row.get("product_link"),
        status: row.get("status"),
        site_id: row.get("site_id"),
        inserted_at: row.get("inserted_at"),
        updated_at: row.get("updated_at"),
    }
}

fn gender_from_row(row: &SqliteRow) -> Result<Gender, sqlx::Error> {
    let code: i64 = row.get("gender");
    Gender::from_code(code).ok_or_else(|| sqlx::Error::Decode(format!("unknown gender code {code}").into()))
}

fn site_type_from_row(row: &SqliteRow) -> Result<SiteType, sqlx::Error> {
    let code: i64 = row.get("site_type");
    SiteType::from_code(code)
        .ok_or_else(|| sqlx::Error::Decode(format!("unknown site type code {code}").into()))
}

fn site_from_row(row: &SqliteRow) -> Result<Site, sqlx::Error> {
    Ok(Site {
        id: row.get("id"),
        name: row.get("name"),
        display_name: row.get("display_name"),
        scrape_url: row.get("scrape_url"),
        gender: gender_from_row(row)?,
        site_type: site_type_from_row(row)?,
        description: row.get("description"),
        inserted_at: row.get("inserted_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Product rows
#[derive(Clone)]
pub struct SqliteProductRepository {
    pool: Arc<SqlitePool>,
}

impl SqliteProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

#[async_trait]
impl CatalogStore for SqliteProductRepository {
    async fn find_by_link(&self, link: &str) -> StoreResult<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE product_link = ?"
        ))
        .bind(link)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(row.as_ref().map(product_from_row))
    }

    async fn create(&self, fields: &ProductFields, at: DateTime<Utc>) -> StoreResult<Product> {
        let result = sqlx::query(
            r#"
            INSERT INTO products
            (title, image_filename, hq_image_filename, price, sale_price, product_link,
             status, site_id, inserted_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&fields.title)
        .bind(&fields.image_filename)
        .bind(&fields.hq_image_filename)
        .bind(&fields.price)
        .bind(&fields.sale_price)
        .bind(&fields.product_link)
        .bind(STATUS_LIVE)
        .bind(fields.site_id)
        .bind(at)
        .bind(at)
        .execute(&*self.pool)
        .await;

        let result = match result {
            Ok(result) => result,
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(StoreError::DuplicateLink(fields.product_link.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Product {
            id: result.last_insert_rowid(),
            title: fields.title.clone(),
            image_filename: fields.image_filename.clone(),
            hq_image_filename: fields.hq_image_filename.clone(),
            price: fields.price.clone(),
            sale_price: fields.sale_price.clone(),
            product_link: fields.product_link.clone(),
            status: STATUS_LIVE,
            site_id: fields.site_id,
            inserted_at: at,
            updated_at: at,
        })
    }

    async fn update(&self, id: i64, fields: &ProductFields, at: DateTime<Utc>) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET title = ?, image_filename = ?, hq_image_filename = ?, price = ?, sale_price = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&fields.title)
        .bind(&fields.image_filename)
        .bind(&fields.hq_image_filename)
        .bind(&fields.price)
        .bind(&fields.sale_price)
        .bind(at)
        .bind(id)
        .execute(&*self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn update_status(&self, id: i64, status: i64, at: DateTime<Utc>) -> StoreResult<()> {
        let result = sqlx::query("UPDATE products SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(at)
            .bind(id)
            .execute(&*self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(&*self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn list_stale(
        &self,
        older_than: DateTime<Utc>,
        after_id: i64,
        limit: u32,
    ) -> StoreResult<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE inserted_at < ? AND id > ? ORDER BY id LIMIT ?"
        ))
        .bind(older_than)
        .bind(after_id)
        .bind(i64::from(limit))
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows.iter().map(product_from_row).collect())
    }

    async fn list_page(&self, after_id: i64, limit: u32) -> StoreResult<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id > ? ORDER BY id LIMIT ?"
        ))
        .bind(after_id)
        .bind(i64::from(limit))
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows.iter().map(product_from_row).collect())
    }

    async fn live_products_for_site(&self, site_id: i64) -> StoreResult<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE site_id = ? AND status = ? ORDER BY id"
        ))
        .bind(site_id)
        .bind(STATUS_LIVE)
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows.iter().map(product_from_row).collect())
    }

    async fn count_image_references(&self, filename: &str) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE image_filename = ? OR hq_image_filename = ?",
        )
        .bind(filename)
        .bind(filename)
        .fetch_one(&*self.pool)
        .await?;

        Ok(count)
    }

    async fn count_inserted_between(
        &self,
        site_name: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM products p
            JOIN sites s ON s.id = p.site_id
            WHERE s.name = ? AND p.inserted_at >= ? AND p.inserted_at < ?
            "#,
        )
        .bind(site_name)
        .bind(from)
        .bind(to)
        .fetch_one(&*self.pool)
        .await?;

        Ok(count)
    }
}

/// Site rows and their scraper heartbeats
#[derive(Clone)]
pub struct SqliteSiteRepository {
    pool: Arc<SqlitePool>,
}

impl SqliteSiteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

#[async_trait]
impl SiteRepository for SqliteSiteRepository {
    async fn ensure_site(&self, definition: &SiteDefinition) -> StoreResult<Site> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO sites
            (name, display_name, scrape_url, gender, site_type, description, inserted_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (name, gender, site_type) DO UPDATE SET
                display_name = excluded.display_name,
                scrape_url = excluded.scrape_url,
                description = excluded.description,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(definition.name)
        .bind(definition.display_name)
        .bind(definition.scrape_url)
        .bind(definition.gender.code())
        .bind(definition.site_type.code())
        .bind(definition.description)
        .bind(now)
        .bind(now)
        .execute(&*self.pool)
        .await?;

        let key = definition.channel_key();
        let site = self
            .find_site(&key)
            .await?
            .ok_or_else(|| StoreError::SiteNotFound(key.to_string()))?;

        sqlx::query("INSERT OR IGNORE INTO scrapers (site_id, last_scraped) VALUES (?, NULL)")
            .bind(site.id)
            .execute(&*self.pool)
            .await?;

        Ok(site)
    }

    async fn find_site(&self, channel: &ChannelKey) -> StoreResult<Option<Site>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, display_name, scrape_url, gender, site_type, description,
                   inserted_at, updated_at
            FROM sites
            WHERE name = ? AND gender = ? AND site_type = ?
            "#,
        )
        .bind(&channel.site)
        .bind(channel.gender.code())
        .bind(channel.site_type.code())
        .fetch_optional(&*self.pool)
        .await?;

        Ok(row.as_ref().map(site_from_row).transpose()?)
    }
}

#[async_trait]
impl ScraperControl for SqliteSiteRepository {
    async fn touch_last_scraped(&self, channel: &ChannelKey, at: DateTime<Utc>) -> StoreResult<()> {
        let site = self
            .find_site(channel)
            .await?
            .ok_or_else(|| StoreError::SiteNotFound(channel.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO scrapers (site_id, last_scraped) VALUES (?, ?)
            ON CONFLICT (site_id) DO UPDATE SET last_scraped = excluded.last_scraped
            "#,
        )
        .bind(site.id)
        .bind(at)
        .execute(&*self.pool)
        .await?;

        Ok(())
    }

    async fn list_scrapers(&self) -> StoreResult<Vec<ScraperRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT s.id AS site_id, s.name, s.gender, s.site_type, sc.last_scraped
            FROM scrapers sc
            JOIN sites s ON s.id = sc.site_id
            ORDER BY s.name, s.gender, s.site_type
            "#,
        )
        .fetch_all(&*self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row.get("name");
            records.push(ScraperRecord {
                site_id: row.get("site_id"),
                channel: ChannelKey::new(name, gender_from_row(row)?, site_type_from_row(row)?),
                last_scraped: row.get("last_scraped"),
            });
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::STATUS_GONE;
    use crate::test_utils::{TestDatabase, sample_definition};
    use chrono::Duration;

    fn fields(link: &str, site_id: i64) -> ProductFields {
        ProductFields {
            title: "Ribbed Tank".into(),
            price: "$38.00".into(),
            sale_price: Some("$19.95".into()),
            image_filename: Some("a.jpg".into()),
            hq_image_filename: Some("b.jpg".into()),
            product_link: link.into(),
            site_id,
        }
    }

    #[tokio::test]
    async fn test_create_find_and_duplicate() {
        let db = TestDatabase::new().await.unwrap();
        let sites = SqliteSiteRepository::new(db.pool());
        let products = SqliteProductRepository::new(db.pool());
        let site = sites.ensure_site(&sample_definition()).await.unwrap();

        let at = Utc::now();
        let created = products.create(&fields("https://shop.test/p/1", site.id), at).await.unwrap();
        assert_eq!(created.status, STATUS_LIVE);

        let found = products.find_by_link("https://shop.test/p/1").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.sale_price.as_deref(), Some("$19.95"));

        let dup = products.create(&fields("https://shop.test/p/1", site.id), at).await;
        assert!(matches!(dup, Err(StoreError::DuplicateLink(_))));
    }

    #[tokio::test]
    async fn test_update_keeps_status() {
        let db = TestDatabase::new().await.unwrap();
        let sites = SqliteSiteRepository::new(db.pool());
        let products = SqliteProductRepository::new(db.pool());
        let site = sites.ensure_site(&sample_definition()).await.unwrap();

        let t0 = Utc::now();
        let created = products.create(&fields("https://shop.test/p/2", site.id), t0).await.unwrap();
        products.update_status(created.id, STATUS_GONE, t0).await.unwrap();

        let mut changed = fields("https://shop.test/p/2", site.id);
        changed.price = "$40.00".into();
        products.update(created.id, &changed, t0 + Duration::seconds(5)).await.unwrap();

        let row = products.find_by_link("https://shop.test/p/2").await.unwrap().unwrap();
        assert_eq!(row.price, "$40.00");
        assert_eq!(row.status, STATUS_GONE);
        assert!(row.updated_at > row.inserted_at);

        assert!(matches!(products.update(9999, &changed, t0).await, Err(StoreError::NotFound(9999))));
    }

    #[tokio::test]
    async fn test_stale_listing_and_counts() {
        let db = TestDatabase::new().await.unwrap();
        let sites = SqliteSiteRepository::new(db.pool());
        let products = SqliteProductRepository::new(db.pool());
        let site = sites.ensure_site(&sample_definition()).await.unwrap();

        let now = Utc::now();
        let old = now - Duration::days(10);
        for i in 0..3 {
            products.create(&fields(&format!("https://shop.test/old/{i}"), site.id), old).await.unwrap();
        }
        products.create(&fields("https://shop.test/new", site.id), now).await.unwrap();

        let threshold = now - Duration::days(1);
        let first = products.list_stale(threshold, 0, 2).await.unwrap();
        assert_eq!(first.len(), 2);
        let rest = products.list_stale(threshold, first[1].id, 2).await.unwrap();
        assert_eq!(rest.len(), 1);

        let recent = products
            .count_inserted_between(&site.name, now - Duration::hours(1), now + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(recent, 1);

        products.update_status(rest[0].id, STATUS_GONE, now).await.unwrap();
        assert_eq!(products.live_products_for_site(site.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_ensure_site_is_idempotent_and_heartbeat() {
        let db = TestDatabase::new().await.unwrap();
        let sites = SqliteSiteRepository::new(db.pool());
        let definition = sample_definition();

        let first = sites.ensure_site(&definition).await.unwrap();
        let second = sites.ensure_site(&definition).await.unwrap();
        assert_eq!(first.id, second.id);

        let scrapers = sites.list_scrapers().await.unwrap();
        assert_eq!(scrapers.len(), 1);
        assert!(scrapers[0].last_scraped.is_none());

        let at = Utc::now();
        sites.touch_last_scraped(&definition.channel_key(), at).await.unwrap();
        let scrapers = sites.list_scrapers().await.unwrap();
        assert_eq!(scrapers[0].channel, definition.channel_key());
        assert!(scrapers[0].last_scraped.is_some());

        let unknown = ChannelKey::new("Nowhere", Gender::Men, SiteType::Sale);
        assert!(matches!(
            sites.touch_last_scraped(&unknown, at).await,
            Err(StoreError::SiteNotFound(_))
        ));
    }
}
