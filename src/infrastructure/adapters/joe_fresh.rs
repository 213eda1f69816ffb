//! Joe Fresh women's sale via the `plpData` JSON endpoint

use serde_json::Value;

use super::SiteAdapter;
use crate::domain::fetch::FetchMode;
use crate::domain::product::RawProductRecord;
use crate::domain::site::{Gender, SiteDefinition, SiteType};
use crate::infrastructure::parsing::{ParseContext, ParsedListing, ParsingError, ParsingResult, json_str};

const SITE_ROOT: &str = "https://www.joefresh.com/ca";

pub fn adapter() -> SiteAdapter {
    SiteAdapter {
        definition: SiteDefinition {
            name: "Joe-fresh",
            display_name: "Joe Fresh",
            scrape_url: "https://www.joefresh.com/ca/Categories/Women/Sale/c/10057",
            host: "joefresh.com",
            gender: Gender::Women,
            site_type: SiteType::Sale,
            description: None,
        },
        listing_url: |page| {
            format!("{SITE_ROOT}/**/c/10057/plpData?q=:relevance&sort=popular-desc&page={page}")
        },
        default_pages: 0..=5,
        listing_mode: FetchMode::Plain,
        health_mode: FetchMode::Plain,
        parser: parse,
        dead_marker: |content| content.to_lowercase().contains("no longer available"),
    }
}

/// `currencyIso` + `formattedValue`, e.g. `CAD$12.00`
fn money(product: &Value, field: &str) -> Option<String> {
    let currency = json_str(product, &format!("/{field}/currencyIso")).unwrap_or_default();
    json_str(product, &format!("/{field}/formattedValue")).map(|value| format!("{currency}{value}"))
}

fn parse(content: &str, context: &ParseContext) -> ParsingResult<ParsedListing> {
    let payload: Value = serde_json::from_str(content)?;
    let results = payload
        .pointer("/0/results")
        .and_then(Value::as_array)
        .ok_or_else(|| ParsingError::unexpected_shape("array whose first entry has results"))?;

    let mut listing = ParsedListing::default();
    for product in results {
        let effective = money(product, "minEffectivePrice");
        let regular = money(product, "minRegularPrice");

        listing.accept(
            RawProductRecord {
                title: json_str(product, "/name"),
                price: regular.or_else(|| effective.clone()),
                sale_price: effective,
                image_urls: json_str(product, "/images/hover/0").into_iter().collect(),
                product_link: json_str(product, "/url").map(|url| format!("{SITE_ROOT}{url}")),
            },
            context,
        );
    }
    Ok(listing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regular_price_falls_back_to_effective() {
        let body = r#"[{"results":[
            {"name":"Fleece Jogger","url":"/Women/p/123",
             "minEffectivePrice":{"currencyIso":"CAD","formattedValue":"$14.00"},
             "minRegularPrice":{"currencyIso":"CAD","formattedValue":"$29.00"},
             "images":{"hover":["https://i1.adis.ws/i/joefresh/123_hover"]}},
            {"name":"Tank","url":"/Women/p/456",
             "minEffectivePrice":{"currencyIso":"CAD","formattedValue":"$5.00"},
             "images":{"hover":["https://i1.adis.ws/i/joefresh/456_hover"]}},
            {"name":"Imageless","url":"/Women/p/789",
             "minEffectivePrice":{"currencyIso":"CAD","formattedValue":"$5.00"},
             "images":{"hover":[]}}
        ]}]"#;

        let listing = adapter().parse_listing(body, 0).unwrap();
        assert_eq!(listing.records.len(), 2);
        assert_eq!(listing.skipped, 1);

        assert_eq!(listing.records[0].price.as_deref(), Some("CAD$29.00"));
        assert_eq!(listing.records[0].sale_price.as_deref(), Some("CAD$14.00"));
        assert_eq!(
            listing.records[0].product_link.as_deref(),
            Some("https://www.joefresh.com/ca/Women/p/123")
        );
        assert_eq!(listing.records[1].price.as_deref(), Some("CAD$5.00"));
    }

    #[test]
    fn object_payload_is_unexpected() {
        assert!(matches!(
            adapter().parse_listing(r#"{"results":[]}"#, 0),
            Err(ParsingError::UnexpectedShape { .. })
        ));
    }
}
