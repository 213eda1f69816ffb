//! Channel runner: adapter → normalizer → image mirror → reconciler
//!
//! Listing pages are fetched a few at a time but consumed strictly in page
//! order, and every record of a page is reconciled before the next page is
//! looked at. Whatever was reconciled before a failure or a cancellation
//! stays committed.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::ops::RangeInclusive;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::application::context::IngestContext;
use crate::application::errors::IngestResult;
use crate::application::images::ImageMirror;
use crate::application::normalizer::normalize;
use crate::application::reconciler::{CatalogReconciler, ReconcileOutcome};
use crate::domain::fetch::FetchResponse;
use crate::domain::product::ProductFields;
use crate::domain::site::{ChannelKey, Site};
use crate::infrastructure::adapters::SiteAdapter;

/// What one channel run did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelRunSummary {
    pub channel: String,
    pub pages_requested: usize,
    pub pages_processed: usize,
    /// Pages dropped for a fetch error, a non-200 status or an unparseable body
    pub pages_skipped: usize,
    pub inserted: usize,
    pub updated: usize,
    /// Listing entries missing a required field
    pub parse_gaps: usize,
    pub image_failures: usize,
    pub store_failures: usize,
    pub cancelled: bool,
    pub heartbeat_written: bool,
}

impl ChannelRunSummary {
    fn new(channel: &ChannelKey) -> Self {
        Self {
            channel: channel.to_string(),
            ..Self::default()
        }
    }
}

pub struct ChannelRunner {
    context: IngestContext,
    reconciler: CatalogReconciler,
    images: ImageMirror,
}

impl ChannelRunner {
    pub fn new(context: IngestContext) -> Self {
        let reconciler = CatalogReconciler::new(context.catalog.clone());
        let images = ImageMirror::new(context.gateway.clone(), context.blobs.clone());
        Self {
            context,
            reconciler,
            images,
        }
    }

    /// Run a channel over its default page range
    pub async fn run(&self, adapter: &SiteAdapter, cancel: &CancellationToken) -> IngestResult<ChannelRunSummary> {
        self.run_pages(adapter, adapter.default_pages.clone(), cancel).await
    }

    pub async fn run_pages(
        &self,
        adapter: &SiteAdapter,
        pages: RangeInclusive<u32>,
        cancel: &CancellationToken,
    ) -> IngestResult<ChannelRunSummary> {
        let channel = adapter.channel_key();
        let span = info_span!("channel_run", channel = %channel);
        self.run_inner(adapter, &channel, pages, cancel).instrument(span).await
    }

    async fn run_inner(
        &self,
        adapter: &SiteAdapter,
        channel: &ChannelKey,
        pages: RangeInclusive<u32>,
        cancel: &CancellationToken,
    ) -> IngestResult<ChannelRunSummary> {
        // Missing proxy credentials abort the run before any fetch
        self.context.config.validate_for(adapter.fetch_modes())?;
        let site = self.context.sites.ensure_site(&adapter.definition).await?;

        let urls = adapter.build_listing_urls(pages);
        let mut summary = ChannelRunSummary::new(channel);
        summary.pages_requested = urls.len();
        info!(pages = urls.len(), mode = ?adapter.listing_mode, "Starting channel run");

        let gateway = &self.context.gateway;
        let mode = adapter.listing_mode;
        let mut fetched = stream::iter(urls)
            .map(|(page, url)| async move {
                let result = gateway.fetch(&url, mode).await;
                (page, url, result)
            })
            .buffered(self.context.config.crawling.list_page_max_concurrent.max(1));

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    summary.cancelled = true;
                    break;
                }
                next = fetched.next() => next,
            };
            let Some((page, url, result)) = next else {
                break;
            };

            match result {
                Ok(response) if response.is_ok() => {
                    self.process_page(adapter, &site, page, &response, &mut summary).await;
                }
                Ok(response) => {
                    warn!(page, url = %url, status = response.status, "Listing page returned non-200, skipping");
                    summary.pages_skipped += 1;
                }
                Err(e) => {
                    warn!(page, url = %url, error = %e, "Listing page fetch failed, skipping");
                    summary.pages_skipped += 1;
                }
            }
        }

        if summary.cancelled {
            warn!(processed = summary.pages_processed, "Channel run cancelled between pages");
        } else if summary.pages_requested > 0 && summary.pages_processed == 0 {
            // The channel stays stale so a rejected key or a redesigned site gets noticed
            error!(skipped = summary.pages_skipped, "No listing page could be processed, heartbeat not written");
        } else {
            match self.context.scrapers.touch_last_scraped(channel, Utc::now()).await {
                Ok(()) => summary.heartbeat_written = true,
                Err(e) => error!(error = %e, "Failed to record channel heartbeat"),
            }
        }

        info!(
            inserted = summary.inserted,
            updated = summary.updated,
            pages_skipped = summary.pages_skipped,
            parse_gaps = summary.parse_gaps,
            image_failures = summary.image_failures,
            store_failures = summary.store_failures,
            "Channel run finished"
        );
        Ok(summary)
    }

    async fn process_page(
        &self,
        adapter: &SiteAdapter,
        site: &Site,
        page: u32,
        response: &FetchResponse,
        summary: &mut ChannelRunSummary,
    ) {
        let listing = match adapter.parse_listing(&response.text(), page) {
            Ok(listing) => listing,
            Err(e) => {
                warn!(page, error = %e, "Listing page could not be parsed, skipping");
                summary.pages_skipped += 1;
                return;
            }
        };
        summary.pages_processed += 1;
        summary.parse_gaps += listing.skipped;
        debug!(page, records = listing.records.len(), skipped = listing.skipped, "Parsed listing page");

        for record in &listing.records {
            let product = match normalize(record, adapter.definition.scrape_url) {
                Ok(product) => product,
                Err(e) => {
                    debug!(page, error = %e, "Dropping record that failed normalization");
                    summary.parse_gaps += 1;
                    continue;
                }
            };

            let files = match self.images.mirror(&product).await {
                Ok(files) => files,
                Err(e) => {
                    warn!(link = %product.product_link, error = %e, "Image mirroring failed, skipping product");
                    summary.image_failures += 1;
                    continue;
                }
            };

            let fields = ProductFields::from_normalized(&product, &files, site.id);
            match self.reconciler.reconcile(&fields).await {
                Ok(ReconcileOutcome::Inserted(_)) => summary.inserted += 1,
                Ok(ReconcileOutcome::Updated(_)) => summary.updated += 1,
                Err(e) => {
                    error!(link = %fields.product_link, error = %e, "Failed to reconcile product");
                    summary.store_failures += 1;
                }
            }
        }
    }
}
