//! Fashion Bunker sale collection (Shopify storefront, no anti-bot proxy)

use scraper::Html;

use super::SiteAdapter;
use crate::domain::fetch::FetchMode;
use crate::domain::product::RawProductRecord;
use crate::domain::site::{Gender, SiteDefinition, SiteType};
use crate::infrastructure::parsing::{
    ParseContext, ParsedListing, ParsingResult, attr_of, compile, text_of,
};

pub fn adapter() -> SiteAdapter {
    SiteAdapter {
        definition: SiteDefinition {
            name: "Fashionbunker",
            display_name: "Fashion Bunker",
            scrape_url: "https://fashionbunker.com/collections/sale",
            host: "fashionbunker.com",
            gender: Gender::Women,
            site_type: SiteType::Sale,
            description: None,
        },
        listing_url: |page| format!("https://fashionbunker.com/collections/sale?page={page}"),
        default_pages: 1..=30,
        listing_mode: FetchMode::Direct,
        health_mode: FetchMode::Direct,
        parser: parse,
        dead_marker: is_sold_out,
    }
}

fn parse(content: &str, context: &ParseContext) -> ParsingResult<ParsedListing> {
    let document = Html::parse_document(content);
    let tile = compile(".product-grid > li.grid__item")?;
    let title = compile("h3.card__heading a span, h3.card__heading a")?;
    let price = compile(".price-item--sale")?;
    let image = compile("div.card__media img")?;
    let link = compile("a.card__media-link, h3.card__heading a")?;

    let mut listing = ParsedListing::default();
    for element in document.select(&tile) {
        listing.accept(
            RawProductRecord {
                title: text_of(&element, &title),
                price: text_of(&element, &price),
                sale_price: None,
                // Shopify serves one protocol-relative image for both slots
                image_urls: attr_of(&element, &image, "src").into_iter().collect(),
                product_link: attr_of(&element, &link, "href"),
            },
            context,
        );
    }
    Ok(listing)
}

/// Shopify marks a product that can no longer be bought with a disabled "Sold out" button
fn is_sold_out(content: &str) -> bool {
    let Ok(button) = compile(".product-form__submit, .price__badge-sold-out") else {
        return false;
    };
    Html::parse_document(content).select(&button).any(|node| {
        node.text()
            .collect::<String>()
            .to_lowercase()
            .contains("sold out")
    })
}
