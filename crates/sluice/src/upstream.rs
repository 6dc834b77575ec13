//! Blocking client for upstream data providers.
//!
//! Some feeds are pulled from a web API instead of landing in the object
//! store. The client keeps that surface small: JSON GETs with a request
//! timeout, capped exponential backoff for transport and server-side
//! failures, and a header-driven pagination iterator. Authentication is a
//! caller-supplied header value; token acquisition lives outside this
//! crate.

use std::marker::PhantomData;
use std::time::Duration;

use backon::{BlockingRetryable, ExponentialBuilder};
use diagnostics::log_warn;
use serde::de::DeserializeOwned;

use crate::error::UpstreamError;

/// Response header naming the next page token, when more pages exist.
const NEXT_PAGE_HEADER: &str = "x-next-page";
/// Request header carrying the page token on follow-up calls.
const START_PAGE_HEADER: &str = "x-start-page";

const TIMEOUT_SECONDS: u64 = 60;

pub struct UpstreamClient {
    http: reqwest::blocking::Client,
    auth_header: Option<String>,
    max_retries: usize,
    min_retry_delay: Duration,
}

impl UpstreamClient {
    pub fn new(auth_header: Option<String>) -> Result<UpstreamClient, UpstreamError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECONDS))
            .build()?;
        Ok(UpstreamClient {
            http,
            auth_header,
            max_retries: 4,
            min_retry_delay: Duration::from_secs(1),
        })
    }

    /// Override the retry policy (attempt count and first delay).
    pub fn with_retry(mut self, max_retries: usize, min_delay: Duration) -> UpstreamClient {
        self.max_retries = max_retries;
        self.min_retry_delay = min_delay;
        self
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_retry_delay)
            .with_max_times(self.max_retries)
    }

    /// GET one JSON document, retrying retryable failures with capped
    /// exponential backoff before giving up.
    pub fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, UpstreamError> {
        let fetch = || self.fetch_page::<T>(url, &None).map(|(value, _)| value);
        fetch
            .retry(self.backoff())
            .when(UpstreamError::is_retryable)
            .notify(|err, dur| {
                let why = err.to_string();
                let delay = format!("{:?}", dur);
                log_warn!("upstream call failed ({why}), retrying in {delay}");
            })
            .call()
    }

    /// Iterate a paginated endpoint; each item is one page's document.
    pub fn fetch_pages<T: DeserializeOwned>(&self, url: &str) -> PageIter<'_, T> {
        PageIter {
            client: self,
            url: url.to_string(),
            next: Some(String::new()),
            phantom: PhantomData,
        }
    }

    fn fetch_page<T: DeserializeOwned>(
        &self,
        url: &str,
        page: &Option<String>,
    ) -> Result<(T, Option<String>), UpstreamError> {
        let mut request = self.http.get(url);
        if let Some(auth) = &self.auth_header {
            request = request.header("authorization", auth);
        }
        if let Some(token) = page {
            if !token.is_empty() {
                request = request.header(START_PAGE_HEADER, token);
            }
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let next = response
            .headers()
            .get(NEXT_PAGE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let text = response.text()?;
        let value = serde_json::from_str(&text).map_err(|source| UpstreamError::Decode {
            url: url.to_string(),
            source,
        })?;
        Ok((value, next))
    }
}

/// Iterator over a header-paginated endpoint. Ends after the first page
/// whose response carries no next-page header; the first error ends the
/// iteration too.
pub struct PageIter<'a, T: DeserializeOwned> {
    client: &'a UpstreamClient,
    url: String,
    next: Option<String>,
    phantom: PhantomData<T>,
}

impl<'a, T: DeserializeOwned> Iterator for PageIter<'a, T> {
    type Item = Result<T, UpstreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        let page = self.next.take()?;
        let page = Some(page);
        let fetch = || self.client.fetch_page::<T>(&self.url, &page);
        match fetch
            .retry(self.client.backoff())
            .when(UpstreamError::is_retryable)
            .notify(|err, dur| {
                let why = err.to_string();
                let delay = format!("{:?}", dur);
                log_warn!("upstream page fetch failed ({why}), retrying in {delay}");
            })
            .call()
        {
            Ok((value, next)) => {
                self.next = next;
                Some(Ok(value))
            }
            Err(err) => Some(Err(err)),
        }
    }
}
