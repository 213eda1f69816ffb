//! Anthropologie (women, sale)
//!
//! Pages normally carry the same product tiles as Free People. When a page
//! comes back without tiles, the embedded `application/ld+json` `ItemList`
//! is used instead.

use scraper::Html;
use serde_json::Value;

use super::SiteAdapter;
use super::pwa::{self, TileImages, TileLayout};
use crate::domain::fetch::FetchMode;
use crate::domain::product::RawProductRecord;
use crate::domain::site::{Gender, SiteDefinition, SiteType};
use crate::infrastructure::parsing::{ParseContext, ParsedListing, ParsingResult, compile, json_str, resolve_url};

const SITE_ROOT: &str = "https://www.anthropologie.com";
const LINK_PREFIX: &str = "https://www.anthropologie.com/shop";

const LAYOUT: TileLayout = TileLayout {
    tile: ".o-pwa-product-tile",
    images: TileImages::Srcset {
        standard: 349,
        high_res: 698,
    },
    link_prefix: LINK_PREFIX,
};

pub fn adapter() -> SiteAdapter {
    SiteAdapter {
        definition: SiteDefinition {
            name: "Anthropologie",
            display_name: "Anthropologie",
            scrape_url: "https://www.anthropologie.com/clothing-new-this-week",
            host: "anthropologie.com",
            gender: Gender::Women,
            site_type: SiteType::Sale,
            description: None,
        },
        listing_url: |page| format!("https://www.anthropologie.com/clothing-new-this-week?page={page}"),
        default_pages: 1..=3,
        listing_mode: FetchMode::Premium,
        health_mode: FetchMode::Premium,
        parser: parse,
        dead_marker: pwa::has_oos_marker,
    }
}

fn parse(content: &str, context: &ParseContext) -> ParsingResult<ParsedListing> {
    let listing = pwa::parse_tiles(content, context, &LAYOUT)?;
    if !listing.is_empty() || listing.skipped > 0 {
        return Ok(listing);
    }
    parse_item_list(content, context)
}

fn parse_item_list(content: &str, context: &ParseContext) -> ParsingResult<ParsedListing> {
    let document = Html::parse_document(content);
    let scripts = compile(r#"script[type="application/ld+json"]"#)?;

    let mut listing = ParsedListing::default();
    for script in document.select(&scripts) {
        let Ok(payload) = serde_json::from_str::<Value>(&script.text().collect::<String>()) else {
            continue;
        };
        if payload.get("@type").and_then(Value::as_str) != Some("ItemList") {
            continue;
        }

        let elements = payload
            .get("itemListElement")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for element in elements {
            let item = element.get("item").unwrap_or(element);
            listing.accept(item_record(item), context);
        }
    }
    Ok(listing)
}

fn item_record(item: &Value) -> RawProductRecord {
    let image = match item.get("image") {
        Some(Value::Array(images)) => images.first().and_then(Value::as_str).map(str::to_string),
        Some(Value::String(image)) => Some(image.clone()),
        _ => None,
    };

    let price = item.pointer("/offers/price").and_then(|price| match price {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    let currency = json_str(item, "/offers/priceCurrency");
    let price = price.map(|amount| match currency.as_deref() {
        None | Some("USD") => format!("${amount}"),
        Some(code) => format!("{code} {amount}"),
    });

    // ld+json urls are document paths that already include `/shop`
    let product_link = json_str(item, "/url").map(|href| resolve_url(SITE_ROOT, &href).unwrap_or(href));

    RawProductRecord {
        title: json_str(item, "/name"),
        price,
        sale_price: None,
        image_urls: image.into_iter().collect(),
        product_link,
    }
}
