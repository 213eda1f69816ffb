//! H&M women's sale, read from the listing JSON endpoint

use serde_json::Value;

use super::SiteAdapter;
use crate::domain::fetch::FetchMode;
use crate::domain::product::RawProductRecord;
use crate::domain::site::{Gender, SiteDefinition, SiteType};
use crate::infrastructure::parsing::{ParseContext, ParsedListing, ParsingError, ParsingResult, json_str};

const PAGE_SIZE: u32 = 36;
const SITE_ROOT: &str = "https://www2.hm.com";

pub fn adapter() -> SiteAdapter {
    SiteAdapter {
        definition: SiteDefinition {
            name: "Hm",
            display_name: "H&M",
            scrape_url: "https://www2.hm.com/en_ca/sale/shopbyproductladies/view-all.html",
            host: "hm.com",
            gender: Gender::Women,
            site_type: SiteType::Sale,
            description: None,
        },
        listing_url,
        default_pages: 0..=7,
        listing_mode: FetchMode::Plain,
        health_mode: FetchMode::Plain,
        parser: parse,
        dead_marker: is_unavailable,
    }
}

fn listing_url(page: u32) -> String {
    format!(
        "{SITE_ROOT}/en_ca/sale/shopbyproductladies/view-all/_jcr_content/main/productlisting_b48c.display.json\
         ?sort=stock&image-size=small&image=stillLife&offset={}&page-size={PAGE_SIZE}",
        page * PAGE_SIZE
    )
}

fn parse(content: &str, context: &ParseContext) -> ParsingResult<ParsedListing> {
    let payload: Value = serde_json::from_str(content)?;
    let products = payload
        .get("products")
        .and_then(Value::as_array)
        .ok_or_else(|| ParsingError::unexpected_shape("object with a products array"))?;

    let mut listing = ParsedListing::default();
    for product in products {
        let image_url = json_str(product, "/image/0/src");
        let image_urls = image_url
            .map(|standard| {
                let high_res = standard.replace("/product/style", "/product/main");
                vec![standard, high_res]
            })
            .unwrap_or_default();

        listing.accept(
            RawProductRecord {
                title: json_str(product, "/title"),
                price: json_str(product, "/price"),
                sale_price: json_str(product, "/redPrice"),
                image_urls,
                product_link: json_str(product, "/link").map(|link| {
                    if link.starts_with('/') {
                        format!("{SITE_ROOT}{link}")
                    } else {
                        link
                    }
                }),
            },
            context,
        );
    }
    Ok(listing)
}

fn is_unavailable(content: &str) -> bool {
    let lower = content.to_lowercase();
    lower.contains("this product is no longer available") || lower.contains("product is not available")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_listing_json() {
        let body = r#"{"products":[
            {"title":"Linen-blend Shorts","price":"$24.99","redPrice":"$12.99",
             "image":[{"src":"//lp2.hm.com/hmgoepprod?source=url[/product/style]"}],
             "link":"/en_ca/productpage.1071.html"},
            {"title":"No Image","price":"$9.99","image":[],"link":"/en_ca/productpage.2.html"}
        ]}"#;

        let listing = adapter().parse_listing(body, 0).unwrap();
        assert_eq!(listing.records.len(), 1);
        assert_eq!(listing.skipped, 1);

        let record = &listing.records[0];
        assert_eq!(record.sale_price.as_deref(), Some("$12.99"));
        assert_eq!(
            record.image_urls[1],
            "//lp2.hm.com/hmgoepprod?source=url[/product/main]"
        );
        assert_eq!(
            record.product_link.as_deref(),
            Some("https://www2.hm.com/en_ca/productpage.1071.html")
        );
    }

    #[test]
    fn malformed_payload_fails_the_page() {
        let adapter = adapter();
        assert!(matches!(adapter.parse_listing("<html>", 0), Err(ParsingError::InvalidJson { .. })));
        assert!(matches!(
            adapter.parse_listing(r#"{"items":[]}"#, 0),
            Err(ParsingError::UnexpectedShape { .. })
        ));
    }

    #[test]
    fn pages_map_to_offsets() {
        let urls = adapter().build_listing_urls(0..=1);
        assert!(urls[0].1.contains("offset=0&page-size=36"));
        assert!(urls[1].1.contains("offset=36&page-size=36"));
    }
}
