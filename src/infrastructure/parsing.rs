//! HTML and JSON extraction helpers shared by the site adapters
//!
//! Adapters compile their selectors through [`compile`] so a bad selector
//! surfaces as a [`ParsingError`] for the page instead of a panic.

pub mod context;
pub mod error;

pub use context::{ParseContext, ParsedListing};
pub use error::{ParsingError, ParsingResult};

use scraper::{ElementRef, Selector};
use serde_json::Value;
use url::Url;

/// Compile a CSS selector
pub fn compile(selector: &str) -> ParsingResult<Selector> {
    Selector::parse(selector).map_err(|e| ParsingError::invalid_selector(selector, e))
}

/// Collapse runs of whitespace and trim; `None` when nothing is left
pub fn clean_text(raw: &str) -> Option<String> {
    let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

/// Text of the first element matching `selector` under `element`
pub fn text_of(element: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .find_map(|node| clean_text(&node.text().collect::<String>()))
}

/// Attribute of the first element matching `selector` under `element`
pub fn attr_of(element: &ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    element
        .select(selector)
        .find_map(|node| node.value().attr(attr))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Resolve `href` against `base_url`; protocol-relative URLs get `https:`
pub fn resolve_url(base_url: &str, href: &str) -> ParsingResult<String> {
    let href = href.trim();
    if href.starts_with("//") {
        return Ok(format!("https:{href}"));
    }
    if let Ok(absolute) = Url::parse(href) {
        return Ok(absolute.to_string());
    }

    let base = Url::parse(base_url)
        .map_err(|e| ParsingError::url_resolution_failed(href, e, Some(base_url)))?;
    base.join(href)
        .map(|url| url.to_string())
        .map_err(|e| ParsingError::url_resolution_failed(href, e, Some(base_url)))
}

/// Candidates of a `srcset` attribute as `(url, width)` pairs
pub fn parse_srcset(srcset: &str) -> Vec<(String, Option<u32>)> {
    srcset
        .split(',')
        .filter_map(|candidate| {
            let mut parts = candidate.split_whitespace();
            let url = parts.next()?;
            let width = parts
                .next()
                .and_then(|descriptor| descriptor.strip_suffix('w'))
                .and_then(|w| w.parse().ok());
            Some((url.to_string(), width))
        })
        .collect()
}

/// Candidate with exactly `width`, falling back to the widest one
pub fn srcset_pick(candidates: &[(String, Option<u32>)], width: u32) -> Option<String> {
    candidates
        .iter()
        .find(|(_, w)| *w == Some(width))
        .or_else(|| candidates.iter().max_by_key(|(_, w)| w.unwrap_or(0)))
        .map(|(url, _)| url.clone())
}

/// Non-blank string at a JSON pointer
pub fn json_str(value: &Value, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .and_then(clean_text)
}
