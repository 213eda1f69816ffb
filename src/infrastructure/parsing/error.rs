//! Parsing error types
//!
//! These cover failures of a whole page. A single malformed listing entry is
//! never an error; it is counted as skipped in [`super::ParsedListing`].

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParsingError {
    #[error("Invalid CSS selector: {selector} - {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Invalid JSON payload: {reason}")]
    InvalidJson { reason: String },

    #[error("Unexpected payload shape: expected {expected}")]
    UnexpectedShape { expected: String },

    #[error("URL resolution failed: {url} - {reason}")]
    UrlResolutionFailed {
        url: String,
        reason: String,
        base_url: Option<String>,
    },
}

impl ParsingError {
    pub fn invalid_selector(selector: &str, reason: impl ToString) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn unexpected_shape(expected: impl Into<String>) -> Self {
        Self::UnexpectedShape {
            expected: expected.into(),
        }
    }

    pub fn url_resolution_failed(url: &str, reason: impl ToString, base_url: Option<&str>) -> Self {
        Self::UrlResolutionFailed {
            url: url.to_string(),
            reason: reason.to_string(),
            base_url: base_url.map(str::to_string),
        }
    }
}

impl From<serde_json::Error> for ParsingError {
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidJson {
            reason: error.to_string(),
        }
    }
}

pub type ParsingResult<T> = Result<T, ParsingError>;
