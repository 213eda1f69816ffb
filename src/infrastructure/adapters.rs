//! Site adapters
//!
//! Each source site is a [`SiteAdapter`] record: its site definition, how to
//! build listing URLs, which fetch modes it needs, a parse function and a
//! dead-page detector. The channel pipeline drives every adapter the same way.

pub mod anthropologie;
pub mod fashionbunker;
pub mod freepeople;
pub mod hm;
pub mod joe_fresh;
pub mod pwa;
pub mod urban_outfitters;

use std::ops::RangeInclusive;

use crate::domain::fetch::FetchMode;
use crate::domain::site::{ChannelKey, SiteDefinition};
use crate::infrastructure::parsing::{ParseContext, ParsedListing, ParsingResult};

/// Parses one fetched listing page into raw records
pub type ListingParser = fn(&str, &ParseContext) -> ParsingResult<ParsedListing>;

/// Whether a fetched product page (status 200) says the product is gone
pub type DeadMarkerDetector = fn(&str) -> bool;

#[derive(Debug, Clone)]
pub struct SiteAdapter {
    pub definition: SiteDefinition,
    /// Listing URL for one page number
    pub listing_url: fn(u32) -> String,
    pub default_pages: RangeInclusive<u32>,
    /// Mode listing pages are fetched in
    pub listing_mode: FetchMode,
    /// Mode product pages are fetched in by the link-health sweep
    pub health_mode: FetchMode,
    pub parser: ListingParser,
    pub dead_marker: DeadMarkerDetector,
}

impl SiteAdapter {
    pub fn channel_key(&self) -> ChannelKey {
        self.definition.channel_key()
    }

    /// Listing URLs for `pages`, in page order
    /// Default page range with optional overrides; `None` when the bounds are reversed
    pub fn page_range(&self, from: Option<u32>, to: Option<u32>) -> Option<RangeInclusive<u32>> {
        let pages = from.unwrap_or(*self.default_pages.start())..=to.unwrap_or(*self.default_pages.end());
        (!pages.is_empty()).then_some(pages)
    }

    pub fn build_listing_urls(&self, pages: RangeInclusive<u32>) -> Vec<(u32, String)> {
        pages.map(|page| (page, (self.listing_url)(page))).collect()
    }

    /// Parse one listing page; a page-level failure is an error, an incomplete entry is not
    pub fn parse_listing(&self, content: &str, page: u32) -> ParsingResult<ParsedListing> {
        let context = ParseContext::new(page, self.definition.scrape_url);
        (self.parser)(content, &context)
    }

    pub fn detect_unavailable(&self, content: &str) -> bool {
        (self.dead_marker)(content)
    }

    /// Every fetch mode a channel run of this adapter can use
    pub fn fetch_modes(&self) -> [FetchMode; 2] {
        // Images are always fetched directly
        [self.listing_mode, FetchMode::Direct]
    }

    /// Whether a product link belongs to this adapter's site
    pub fn owns_link(&self, link: &str) -> bool {
        let Ok(url) = url::Url::parse(link) else {
            return false;
        };
        let host = self.definition.host;
        url.host_str()
            .is_some_and(|h| h == host || h.strip_suffix(host).is_some_and(|rest| rest.ends_with('.')))
    }
}

/// Every adapter shipped with the crate
pub fn all_adapters() -> Vec<SiteAdapter> {
    vec![
        fashionbunker::adapter(),
        freepeople::adapter(),
        anthropologie::adapter(),
        urban_outfitters::adapter(),
        hm::adapter(),
        joe_fresh::adapter(),
    ]
}
