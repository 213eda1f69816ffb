//! Parsing context and per-page results

use tracing::debug;

use crate::domain::product::RawProductRecord;

/// Context information for parsing one listing page
#[derive(Debug, Clone)]
pub struct ParseContext {
    /// Page number the content was fetched for
    pub page: u32,

    /// Base URL for resolving relative links and images
    pub base_url: String,
}

impl ParseContext {
    pub fn new(page: u32, base_url: impl Into<String>) -> Self {
        Self {
            page,
            base_url: base_url.into(),
        }
    }
}

/// Records extracted from one listing page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedListing {
    /// Complete records, in page order
    pub records: Vec<RawProductRecord>,
    /// Entries dropped for missing a required field
    pub skipped: usize,
}

impl ParsedListing {
    /// Keep `record` if complete, otherwise count it as a parse gap
    pub fn accept(&mut self, record: RawProductRecord, context: &ParseContext) {
        match record.missing_field() {
            None => self.records.push(record),
            Some(field) => {
                debug!(
                    page = context.page,
                    field,
                    title = record.title.as_deref().unwrap_or(""),
                    "Skipping listing entry with missing field"
                );
                self.skipped += 1;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_records_are_counted_not_kept() {
        let context = ParseContext::new(1, "https://shop.test");
        let mut listing = ParsedListing::default();

        listing.accept(
            RawProductRecord {
                title: Some("Tee".into()),
                price: Some("$10".into()),
                sale_price: None,
                image_urls: vec!["https://cdn.test/t.jpg".into()],
                product_link: Some("/p/tee".into()),
            },
            &context,
        );
        listing.accept(
            RawProductRecord {
                title: Some("No price".into()),
                ..RawProductRecord::default()
            },
            &context,
        );

        assert_eq!(listing.records.len(), 1);
        assert_eq!(listing.skipped, 1);
    }
}
