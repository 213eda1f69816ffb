//! Urban Outfitters men's sale

use super::SiteAdapter;
use super::pwa::{self, TileImages, TileLayout};
use crate::domain::fetch::FetchMode;
use crate::domain::site::{Gender, SiteDefinition, SiteType};
use crate::infrastructure::parsing::{ParseContext, ParsedListing, ParsingResult};

const LAYOUT: TileLayout = TileLayout {
    tile: ".c-pwa-tile-grid-inner",
    images: TileImages::ScaledImg {
        selector: "img.o-pwa-image__img",
        high_res: "wid=683",
        standard: "wid=400",
    },
    link_prefix: "https://www.urbanoutfitters.com",
};

pub fn adapter() -> SiteAdapter {
    SiteAdapter {
        definition: SiteDefinition {
            name: "Urban-outfitters",
            display_name: "Urban Outfitters",
            scrape_url: "https://www.urbanoutfitters.com/mens-clothing-sale",
            host: "urbanoutfitters.com",
            gender: Gender::Men,
            site_type: SiteType::Sale,
            description: None,
        },
        listing_url: |page| format!("https://www.urbanoutfitters.com/mens-clothing-sale?page={page}"),
        default_pages: 1..=7,
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

    #[test]
    fn derives_standard_image_from_high_res() {
        let page = r#"<div class="c-pwa-tile-grid-inner">
            <a class="o-pwa-product-tile__link" href="/shop/bdg-baggy-jean">
              <img class="o-pwa-image__img" src="https://images.urbndata.com/is/image/UrbanOutfitters/1?$xlarge$&wid=683&fit=constrain">
            </a>
            <p class="o-pwa-product-tile__heading">BDG Baggy Jean</p>
            <span class="c-pwa-product-price__current">$39.99</span>
        </div>
        <div class="c-pwa-tile-grid-inner"><p class="o-pwa-product-tile__heading">Ad slot</p></div>"#;

        let listing = adapter().parse_listing(page, 1).unwrap();
        assert_eq!(listing.records.len(), 1);
        assert_eq!(listing.skipped, 1);
        assert_eq!(
            listing.records[0].image_urls,
            vec![
                "https://images.urbndata.com/is/image/UrbanOutfitters/1?$xlarge$&wid=400&fit=constrain".to_string(),
                "https://images.urbndata.com/is/image/UrbanOutfitters/1?$xlarge$&wid=683&fit=constrain".to_string(),
            ]
        );
        assert_eq!(adapter().channel_key().to_string(), "Urban-outfitters_2_2");
    }
}
