//! HTTP fetch gateway for crawling with rate limiting and retries
//!
//! Non-direct fetch modes are routed through the anti-bot proxy by wrapping
//! the target URL into `GET {endpoint}?api_key=..&url=<target>&<mode flags>`.
//! Every HTTP status is a successful fetch; only transport failures and
//! exhausted retries surface as [`FetchError`].

use async_trait::async_trait;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, direct::NotKeyed},
};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, USER_AGENT},
};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::domain::fetch::{FetchError, FetchGateway, FetchMode, FetchResponse};
use crate::infrastructure::config::{HttpConfig, ProxyConfig};
use crate::infrastructure::retry_policy::RetryPolicy;

/// reqwest-backed [`FetchGateway`]
pub struct HttpFetchGateway {
    client: Client,
    rate_limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    proxy: ProxyConfig,
    retry: RetryPolicy,
}

impl HttpFetchGateway {
    pub fn new(http: &HttpConfig, proxy: &ProxyConfig) -> anyhow::Result<Self> {
        use anyhow::Context;

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&http.user_agent).context("Invalid user agent")?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(http.timeout_seconds))
            .default_headers(headers)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to create HTTP client")?;

        let rate_limiter = NonZeroU32::new(http.max_requests_per_second)
            .map(|rps| RateLimiter::direct(Quota::per_second(rps)));

        Ok(Self {
            client,
            rate_limiter,
            proxy: proxy.clone(),
            retry: RetryPolicy::from_http_config(http),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// URL actually requested for `target` in `mode`
    pub fn request_url(&self, target: &str, mode: FetchMode) -> Result<Url, FetchError> {
        let invalid = |reason: String| FetchError::InvalidUrl {
            url: target.to_string(),
            reason,
        };

        let parsed = Url::parse(target).map_err(|e| invalid(e.to_string()))?;
        if !mode.requires_proxy() {
            return Ok(parsed);
        }

        let api_key = self
            .proxy
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(FetchError::ProxyNotConfigured { mode })?;

        let mut params = vec![("api_key", api_key), ("url", target)];
        params.extend(mode.proxy_flags().iter().copied());
        Url::parse_with_params(&self.proxy.endpoint, &params).map_err(|e| invalid(e.to_string()))
    }

    async fn attempt(&self, request_url: &Url, target: &str) -> Result<FetchResponse, FetchError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        let response = self
            .client
            .get(request_url.clone())
            .send()
            .await
            .map_err(|e| transport_error(target, &e))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(target, &e))?;

        Ok(FetchResponse::new(status, body.to_vec()))
    }
}

fn transport_error(url: &str, error: &reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout { url: url.to_string() }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl FetchGateway for HttpFetchGateway {
    async fn fetch(&self, url: &str, mode: FetchMode) -> Result<FetchResponse, FetchError> {
        let request_url = self.request_url(url, mode)?;
        let mut attempt = 0;

        loop {
            match self.attempt(&request_url, url).await {
                Ok(response)
                    if RetryPolicy::is_retryable_status(response.status)
                        && self.retry.should_retry(attempt) =>
                {
                    warn!(url, status = response.status, attempt, "Retryable status, backing off");
                }
                Ok(response) => {
                    debug!(url, status = response.status, ?mode, "Fetched");
                    return Ok(response);
                }
                Err(e) if e.is_transient() && self.retry.should_retry(attempt) => {
                    warn!(url, attempt, error = %e, "Fetch failed, backing off");
                }
                Err(e) => return Err(e),
            }

            tokio::time::sleep(self.retry.delay_for(attempt)).await;
            attempt += 1;
        }
    }
}

/// Recover the target URL from a proxy-wrapped URL; other URLs pass through
pub fn unwrap_proxy_url(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            let has_key = parsed.query_pairs().any(|(k, _)| k == "api_key");
            parsed
                .query_pairs()
                .find(|(k, _)| k == "url")
                .filter(|_| has_key)
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or_else(|| url.to_string())
}
