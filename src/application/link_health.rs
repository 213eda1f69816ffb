//! Link-health sweep over catalogued products
//!
//! Each product old enough is re-fetched on its own detail page. A 404 or a
//! site-specific dead marker retires it, a 403 or "Access Denied" page marks
//! it blocked. A blocked product found live again goes back to 200; a
//! retired one is never revived.

use chrono::{Duration, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::application::context::IngestContext;
use crate::application::errors::IngestResult;
use crate::domain::fetch::FetchResponse;
use crate::domain::product::{Product, STATUS_BLOCKED, STATUS_GONE, STATUS_LIVE};
use crate::infrastructure::adapters::SiteAdapter;

const ACCESS_DENIED_MARKER: &str = "Access Denied";

/// Verdict for one product page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthVerdict {
    /// Page is up and shows no dead marker
    Live,
    Gone,
    Blocked,
    /// Any other status; says nothing about the product
    Inconclusive,
}

impl HealthVerdict {
    /// Status to persist, if the verdict warrants a write
    pub fn status(self) -> Option<i64> {
        match self {
            Self::Gone => Some(STATUS_GONE),
            Self::Blocked => Some(STATUS_BLOCKED),
            Self::Live | Self::Inconclusive => None,
        }
    }
}

pub fn classify(response: &FetchResponse, adapter: &SiteAdapter) -> HealthVerdict {
    if response.status == 404 {
        return HealthVerdict::Gone;
    }

    let body = response.text();
    if response.status == 403 || body.contains(ACCESS_DENIED_MARKER) {
        return HealthVerdict::Blocked;
    }
    if !response.is_ok() {
        return HealthVerdict::Inconclusive;
    }
    if adapter.detect_unavailable(&body) {
        HealthVerdict::Gone
    } else {
        HealthVerdict::Live
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthSweepSummary {
    pub checked: usize,
    pub live: usize,
    pub retired: usize,
    pub blocked: usize,
    pub inconclusive: usize,
    /// Already at 404; not re-fetched
    pub already_gone: usize,
    /// No adapter owns the product's host
    pub unroutable: usize,
    pub fetch_failures: usize,
    pub store_failures: usize,
    pub cancelled: bool,
}

enum CheckOutcome {
    Verdict(HealthVerdict),
    AlreadyGone,
    Unroutable,
    FetchFailed,
    StoreFailed,
}

pub struct LinkHealthChecker {
    context: IngestContext,
}

impl LinkHealthChecker {
    pub fn new(context: IngestContext) -> Self {
        Self { context }
    }

    /// Check every product inserted more than `min_age_days` ago
    pub async fn run(&self, min_age_days: i64, cancel: &CancellationToken) -> IngestResult<HealthSweepSummary> {
        self.run_inner(min_age_days, cancel)
            .instrument(info_span!("link_health", min_age_days))
            .await
    }

    async fn run_inner(&self, min_age_days: i64, cancel: &CancellationToken) -> IngestResult<HealthSweepSummary> {
        let modes = self
            .context
            .registry
            .adapters()
            .into_iter()
            .map(|adapter| adapter.health_mode)
            .collect::<Vec<_>>();
        self.context.config.validate_for(modes)?;

        let threshold = Utc::now() - Duration::days(min_age_days.max(0));
        let page_size = self.context.config.crawling.store_page_size.max(1);
        let concurrency = self.context.config.crawling.health_check_max_concurrent.max(1);
        let mut summary = HealthSweepSummary::default();
        let mut after_id = 0;

        info!(%threshold, "Starting link-health sweep");
        loop {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let batch = self.context.catalog.list_stale(threshold, after_id, page_size).await?;
            let Some(last) = batch.last() else {
                break;
            };
            after_id = last.id;

            let outcomes: Vec<CheckOutcome> = stream::iter(batch.iter())
                .map(|product| self.check(product))
                .buffer_unordered(concurrency)
                .collect()
                .await;

            for outcome in outcomes {
                match outcome {
                    CheckOutcome::Verdict(verdict) => {
                        summary.checked += 1;
                        match verdict {
                            HealthVerdict::Live => summary.live += 1,
                            HealthVerdict::Gone => summary.retired += 1,
                            HealthVerdict::Blocked => summary.blocked += 1,
                            HealthVerdict::Inconclusive => summary.inconclusive += 1,
                        }
                    }
                    CheckOutcome::AlreadyGone => summary.already_gone += 1,
                    CheckOutcome::Unroutable => summary.unroutable += 1,
                    CheckOutcome::FetchFailed => summary.fetch_failures += 1,
                    CheckOutcome::StoreFailed => summary.store_failures += 1,
                }
            }
        }

        info!(
            checked = summary.checked,
            retired = summary.retired,
            blocked = summary.blocked,
            fetch_failures = summary.fetch_failures,
            "Link-health sweep finished"
        );
        Ok(summary)
    }

    async fn check(&self, product: &Product) -> CheckOutcome {
        if product.status == STATUS_GONE {
            return CheckOutcome::AlreadyGone;
        }
        let Some(adapter) = self.context.registry.for_link(&product.product_link) else {
            debug!(link = %product.product_link, "No adapter for product host");
            return CheckOutcome::Unroutable;
        };

        let response = match self
            .context
            .gateway
            .fetch(&product.product_link, adapter.health_mode)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(link = %product.product_link, error = %e, "Product page fetch failed");
                return CheckOutcome::FetchFailed;
            }
        };

        let verdict = classify(&response, adapter);
        let target = match verdict {
            HealthVerdict::Live if product.status == STATUS_BLOCKED => Some(STATUS_LIVE),
            _ => verdict.status(),
        };
        let Some(status) = target.filter(|status| *status != product.status) else {
            return CheckOutcome::Verdict(verdict);
        };

        match self.context.catalog.update_status(product.id, status, Utc::now()).await {
            Ok(()) => {
                info!(link = %product.product_link, status, "Product status changed");
                CheckOutcome::Verdict(verdict)
            }
            Err(e) => {
                error!(link = %product.product_link, error = %e, "Failed to update product status");
                CheckOutcome::StoreFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fetch::FetchError;
    use crate::domain::product::ProductFields;
    use crate::domain::repositories::{CatalogStore, SiteRepository};
    use crate::infrastructure::adapters::{fashionbunker, freepeople};
    use crate::test_utils::{TestHarness, product_link, sample_definition};
    use rstest::rstest;

    async fn seed(harness: &TestHarness, titles: &[&str]) -> Vec<Product> {
        let site = harness.sites.ensure_site(&sample_definition()).await.unwrap();
        let at = Utc::now() - Duration::days(1);
        let mut products = Vec::new();
        for title in titles {
            let fields = ProductFields {
                title: (*title).to_string(),
                price: "$10".into(),
                sale_price: None,
                image_filename: Some(format!("{title}.jpg")),
                hq_image_filename: Some(format!("{title}.jpg")),
                product_link: product_link(title),
                site_id: site.id,
            };
            products.push(harness.products.create(&fields, at).await.unwrap());
        }
        products
    }

    async fn status_of(harness: &TestHarness, title: &str) -> i64 {
        harness
            .products
            .find_by_link(&product_link(title))
            .await
            .unwrap()
            .unwrap()
            .status
    }

    async fn sweep(harness: &TestHarness) -> HealthSweepSummary {
        LinkHealthChecker::new(harness.context())
            .run(0, &CancellationToken::new())
            .await
            .unwrap()
    }

    #[rstest]
    #[case(404, "", HealthVerdict::Gone)]
    #[case(403, "", HealthVerdict::Blocked)]
    #[case(200, "<title>Access Denied</title>", HealthVerdict::Blocked)]
    #[case(
        200,
        r#"<div class="c-pwa-product-oos-rec-tray__lead-message">This product is no longer available</div>"#,
        HealthVerdict::Gone
    )]
    #[case(200, "<h1>Tuesday Tee</h1>", HealthVerdict::Live)]
    #[case(500, "", HealthVerdict::Inconclusive)]
    fn classifies_product_pages(#[case] status: u16, #[case] body: &str, #[case] expected: HealthVerdict) {
        let response = FetchResponse::new(status, body.as_bytes().to_vec());
        assert_eq!(classify(&response, &freepeople::adapter()), expected);
    }

    #[test]
    fn dead_markers_are_site_specific() {
        let body = r#"<div class="c-pwa-product-oos-rec-tray__lead-message">This product is no longer available</div>"#;
        let response = FetchResponse::new(200, body.as_bytes().to_vec());
        assert_eq!(classify(&response, &fashionbunker::adapter()), HealthVerdict::Live);
    }

    #[test]
    fn only_terminal_verdicts_write() {
        assert_eq!(HealthVerdict::Gone.status(), Some(STATUS_GONE));
        assert_eq!(HealthVerdict::Blocked.status(), Some(STATUS_BLOCKED));
        assert_eq!(HealthVerdict::Live.status(), None);
        assert_eq!(HealthVerdict::Inconclusive.status(), None);
    }

    #[tokio::test]
    async fn blocked_product_found_live_returns_to_200() {
        let harness = TestHarness::new().await;
        seed(&harness, &["A"]).await;

        harness
            .gateway
            .respond(&product_link("A"), FetchResponse::new(403, Vec::new()));
        let first = sweep(&harness).await;
        assert_eq!(first.blocked, 1);
        assert_eq!(status_of(&harness, "A").await, STATUS_BLOCKED);

        harness
            .gateway
            .respond(&product_link("A"), FetchResponse::new(200, "<h1>A</h1>"));
        let second = sweep(&harness).await;
        assert_eq!(second.live, 1);
        assert_eq!(status_of(&harness, "A").await, STATUS_LIVE);
    }

    #[tokio::test]
    async fn retired_product_is_not_refetched_or_revived() {
        let harness = TestHarness::new().await;
        seed(&harness, &["A"]).await;

        harness
            .gateway
            .respond(&product_link("A"), FetchResponse::new(200, "<p>Sold out</p>"));
        assert_eq!(sweep(&harness).await.retired, 1);
        assert_eq!(status_of(&harness, "A").await, STATUS_GONE);

        harness
            .gateway
            .respond(&product_link("A"), FetchResponse::new(200, "<h1>A</h1>"));
        let summary = sweep(&harness).await;
        assert_eq!(summary.already_gone, 1);
        assert_eq!(summary.checked, 0);
        assert_eq!(harness.gateway.request_count(&product_link("A")), 1);
        assert_eq!(status_of(&harness, "A").await, STATUS_GONE);
    }

    #[tokio::test]
    async fn inconclusive_checks_leave_status_alone() {
        let harness = TestHarness::new().await;
        seed(&harness, &["A", "B"]).await;

        harness
            .gateway
            .respond(&product_link("A"), FetchResponse::new(502, Vec::new()));
        harness.gateway.fail(
            &product_link("B"),
            FetchError::Timeout {
                url: product_link("B"),
            },
        );

        let summary = sweep(&harness).await;
        assert_eq!(summary.inconclusive, 1);
        assert_eq!(summary.fetch_failures, 1);
        assert_eq!(status_of(&harness, "A").await, STATUS_LIVE);
        assert_eq!(status_of(&harness, "B").await, STATUS_LIVE);
    }
}
