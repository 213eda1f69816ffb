//! Fetch gateway contract
//!
//! The pipeline never talks HTTP directly. It asks a [`FetchGateway`] for a URL
//! in a given [`FetchMode`] and gets back a status code and a body.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use thiserror::Error;

/// Anti-bot / rendering treatment requested for a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Straight to the target, no proxy
    Direct,
    /// Routed through the proxy without extra treatment
    Plain,
    /// Proxy renders JavaScript before returning the page
    Rendered,
    /// Proxy uses its premium residential pool
    Premium,
    PremiumRendered,
    /// Highest anti-bot tier the proxy offers
    UltraPremium,
}

impl FetchMode {
    /// Whether this mode needs proxy credentials
    pub const fn requires_proxy(self) -> bool {
        !matches!(self, Self::Direct)
    }

    /// Extra proxy query flags for this mode
    pub const fn proxy_flags(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Direct | Self::Plain => &[],
            Self::Rendered => &[("render", "true")],
            Self::Premium => &[("premium", "true")],
            Self::PremiumRendered => &[("premium", "true"), ("render", "true")],
            Self::UltraPremium => &[("ultra_premium", "true")],
        }
    }
}

/// Raw response of a fetch; any HTTP status is a successful fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Network-level failures; HTTP statuses are not errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("fetch mode {mode:?} requires proxy credentials but none are configured")]
    ProxyNotConfigured { mode: FetchMode },

    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl FetchError {
    /// Transient errors are worth another attempt
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Network { .. })
    }
}

#[async_trait]
pub trait FetchGateway: Send + Sync {
    async fn fetch(&self, url: &str, mode: FetchMode) -> Result<FetchResponse, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_direct_skips_the_proxy() {
        assert!(!FetchMode::Direct.requires_proxy());
        for mode in [
            FetchMode::Plain,
            FetchMode::Rendered,
            FetchMode::Premium,
            FetchMode::PremiumRendered,
            FetchMode::UltraPremium,
        ] {
            assert!(mode.requires_proxy(), "{mode:?}");
        }
    }

    #[test]
    fn premium_rendered_sets_both_flags() {
        let flags = FetchMode::PremiumRendered.proxy_flags();
        assert!(flags.contains(&("premium", "true")));
        assert!(flags.contains(&("render", "true")));
    }

    #[test]
    fn transient_classification() {
        assert!(FetchError::Timeout { url: "u".into() }.is_transient());
        assert!(!FetchError::ProxyNotConfigured { mode: FetchMode::Premium }.is_transient());
    }
}
