//! Product tile markup shared by the URBN storefronts
//! (Free People, Anthropologie, Urban Outfitters)

use scraper::Html;

use crate::domain::product::RawProductRecord;
use crate::infrastructure::parsing::{
    ParseContext, ParsedListing, ParsingResult, attr_of, compile, parse_srcset, srcset_pick,
    text_of,
};

const TITLE: &str = ".o-pwa-product-tile__heading";
const PRICE: &str = "span.c-pwa-product-price__current";
const LINK: &str = ".o-pwa-product-tile__link";
const OOS_MESSAGE: &str = ".c-pwa-product-oos-rec-tray__lead-message";
const OOS_TEXT: &str = "This product is no longer available";

/// How product images are laid out in a tile
#[derive(Debug, Clone, Copy)]
pub enum TileImages {
    /// `<source srcset>` with a standard and a high-res width
    Srcset { standard: u32, high_res: u32 },
    /// High-res `<img src>`; the standard URL swaps one query fragment
    ScaledImg {
        selector: &'static str,
        high_res: &'static str,
        standard: &'static str,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct TileLayout {
    pub tile: &'static str,
    pub images: TileImages,
    /// Prefix for root-relative product hrefs
    pub link_prefix: &'static str,
}

/// Parse every product tile on a listing page
pub fn parse_tiles(content: &str, context: &ParseContext, layout: &TileLayout) -> ParsingResult<ParsedListing> {
    let document = Html::parse_document(content);
    let tile = compile(layout.tile)?;
    let title = compile(TITLE)?;
    let price = compile(PRICE)?;
    let link = compile(LINK)?;
    let source = compile("source")?;

    let mut listing = ParsedListing::default();
    for element in document.select(&tile) {
        let image_urls = match layout.images {
            TileImages::Srcset { standard, high_res } => attr_of(&element, &source, "srcset")
                .map(|srcset| {
                    let candidates = parse_srcset(&srcset);
                    srcset_pick(&candidates, standard)
                        .into_iter()
                        .chain(srcset_pick(&candidates, high_res))
                        .collect()
                })
                .unwrap_or_default(),
            TileImages::ScaledImg {
                selector,
                high_res,
                standard,
            } => attr_of(&element, &compile(selector)?, "src")
                .map(|hq| vec![hq.replace(high_res, standard), hq])
                .unwrap_or_default(),
        };

        let product_link = attr_of(&element, &link, "href").map(|href| {
            if href.starts_with('/') && !href.starts_with("//") {
                format!("{}{href}", layout.link_prefix)
            } else {
                href
            }
        });

        listing.accept(
            RawProductRecord {
                title: text_of(&element, &title),
                price: text_of(&element, &price),
                sale_price: None,
                image_urls,
                product_link,
            },
            context,
        );
    }
    Ok(listing)
}

/// Out-of-stock tray shown on a product page that is gone for good
pub fn has_oos_marker(content: &str) -> bool {
    let Ok(selector) = compile(OOS_MESSAGE) else {
        return false;
    };
    Html::parse_document(content)
        .select(&selector)
        .any(|node| node.text().collect::<String>().contains(OOS_TEXT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oos_marker_needs_the_message_text() {
        let gone = r#"<div class="c-pwa-product-oos-rec-tray__lead-message">
            This product is no longer available. Check out similar styles</div>"#;
        let other = r#"<div class="c-pwa-product-oos-rec-tray__lead-message">Low stock</div>"#;
        assert!(has_oos_marker(gone));
        assert!(!has_oos_marker(other));
        assert!(!has_oos_marker("<html><body>This product is no longer available</body></html>"));
    }
}
