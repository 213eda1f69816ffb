//! Free People new arrivals (women)

use super::SiteAdapter;
use super::pwa::{self, TileImages, TileLayout};
use crate::domain::fetch::FetchMode;
use crate::domain::site::{Gender, SiteDefinition, SiteType};
use crate::infrastructure::parsing::{ParseContext, ParsedListing, ParsingResult};

const LAYOUT: TileLayout = TileLayout {
    tile: ".o-pwa-product-tile",
    images: TileImages::Srcset {
        standard: 349,
        high_res: 698,
    },
    link_prefix: "https://www.freepeople.com",
};

pub fn adapter() -> SiteAdapter {
    SiteAdapter {
        definition: SiteDefinition {
            name: "Freepeople",
            display_name: "Free People",
            scrape_url: "https://www.freepeople.com/whats-new/",
            host: "freepeople.com",
            gender: Gender::Women,
            site_type: SiteType::NewArrivals,
            description: Some("Free People what's new"),
        },
        listing_url: |page| format!("https://www.freepeople.com/whats-new/?page={page}"),
        default_pages: 1..=3,
        listing_mode: FetchMode::UltraPremium,
        health_mode: FetchMode::UltraPremium,
        parser: parse,
        dead_marker: pwa::has_oos_marker,
    }
}

fn parse(content: &str, context: &ParseContext) -> ParsingResult<ParsedListing> {
    pwa::parse_tiles(content, context, &LAYOUT)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body><div class="c-pwa-tile-grid">
          <div class="o-pwa-product-tile">
            <a class="o-pwa-product-tile__link" href="/shop/tuesday-tee/">
              <picture>
                <source srcset="https://images.urbndata.com/is/image/FreePeople/1_a?wid=698 698w, https://images.urbndata.com/is/image/FreePeople/1_a?wid=349 349w">
              </picture>
            </a>
            <p class="o-pwa-product-tile__heading"> Tuesday Tee </p>
            <span class="c-pwa-product-price__current">$48.00</span>
          </div>
          <div class="o-pwa-product-tile">
            <a class="o-pwa-product-tile__link" href="/shop/no-image/"></a>
            <p class="o-pwa-product-tile__heading">No Image Dress</p>
            <span class="c-pwa-product-price__current">$128.00</span>
          </div>
        </div></body></html>"#;

    #[test]
    fn parses_tiles_and_skips_incomplete() {
        let listing = adapter().parse_listing(PAGE, 1).unwrap();

        assert_eq!(listing.records.len(), 1);
        assert_eq!(listing.skipped, 1);

        let record = &listing.records[0];
        assert_eq!(record.title.as_deref(), Some("Tuesday Tee"));
        assert_eq!(record.price.as_deref(), Some("$48.00"));
        assert_eq!(
            record.image_urls,
            vec![
                "https://images.urbndata.com/is/image/FreePeople/1_a?wid=349".to_string(),
                "https://images.urbndata.com/is/image/FreePeople/1_a?wid=698".to_string(),
            ]
        );
        assert_eq!(
            record.product_link.as_deref(),
            Some("https://www.freepeople.com/shop/tuesday-tee/")
        );
    }

    #[test]
    fn builds_three_ultra_premium_pages() {
        let adapter = adapter();
        let urls = adapter.build_listing_urls(adapter.default_pages.clone());
        assert_eq!(urls.len(), 3);
        assert_eq!(urls[2].1, "https://www.freepeople.com/whats-new/?page=3");
        assert_eq!(adapter.listing_mode, FetchMode::UltraPremium);
        assert_eq!(adapter.channel_key().to_string(), "Freepeople_1_1");
    }
}
