//! Raw listing record to canonical product
//!
//! Prices keep the site's own formatting. Images always fill both slots and
//! the product link is made absolute, since it is the catalog's unique key.

use thiserror::Error;
use url::Url;

use crate::domain::product::{NormalizedProduct, RawProductRecord};
use crate::infrastructure::parsing::{ParsingError, clean_text, resolve_url};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("missing required field {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Url(#[from] ParsingError),
}

pub fn normalize(raw: &RawProductRecord, base_url: &str) -> Result<NormalizedProduct, NormalizeError> {
    if let Some(field) = raw.missing_field() {
        return Err(NormalizeError::MissingField(field));
    }

    let title = raw
        .title
        .as_deref()
        .and_then(clean_text)
        .ok_or(NormalizeError::MissingField("title"))?;
    let price = raw
        .price
        .as_deref()
        .and_then(clean_text)
        .ok_or(NormalizeError::MissingField("price"))?;
    let sale_price = raw.sale_price.as_deref().and_then(clean_text);

    let mut images = raw
        .image_urls
        .iter()
        .filter(|url| !url.trim().is_empty())
        .map(|url| resolve_url(base_url, url));
    let image_url = images.next().ok_or(NormalizeError::MissingField("image"))??;
    let hq_image_url = match images.next() {
        Some(hq) => hq?,
        None => image_url.clone(),
    };

    let link = raw
        .product_link
        .as_deref()
        .ok_or(NormalizeError::MissingField("product_link"))?;
    let product_link = canonical_link(&resolve_url(base_url, link)?)?;

    Ok(NormalizedProduct {
        title,
        price,
        sale_price,
        image_url,
        hq_image_url,
        product_link,
    })
}

/// Absolute link without its fragment
fn canonical_link(link: &str) -> Result<String, ParsingError> {
    let mut url = Url::parse(link).map_err(|e| ParsingError::url_resolution_failed(link, e, None))?;
    url.set_fragment(None);
    Ok(url.to_string())
}
