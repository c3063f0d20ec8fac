use log::{debug, warn};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use url::Url;

use crate::auth::Token;
use crate::engine::paginate::{Listing, Page};
use crate::error::{Result, SweepError};

const MAX_RETRIES: u32 = 5;
const RETRY_DELAY_SECONDS: u64 = 10;
const MAX_CONCURRENT_REQUESTS: usize = 100;
const TOTAL_HEADER: &str = "x-total";

/// Largest `per_page` GitLab accepts on REST listings.
pub const MAX_PAGE_SIZE: usize = 100;

/// Thin REST client for the GitLab v4 API.
///
/// Safe to share between any number of concurrent tasks: the underlying
/// `reqwest::Client` pools connections internally and a semaphore caps the
/// number of requests in flight.
pub struct GitLabClient {
    client: Client,
    api_url: Url,
    web_url: Url,
    token: Option<Token>,
    semaphore: Arc<Semaphore>,
    retry_delay: Duration,
}

impl GitLabClient {
    /// Creates a client for the instance at `base_url`.
    ///
    /// `base_url` may carry a relative root (`https://host/gitlab`) and may
    /// already end in `/api/v4`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed or is not http(s).
    pub fn new(base_url: &str, token: Option<Token>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("pkgsweep/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| SweepError::Config(format!("Failed to create HTTP client: {e}")))?;

        let (web_url, api_url) = split_base_url(base_url)?;

        Ok(Self {
            client,
            api_url,
            web_url,
            token,
            semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_REQUESTS)),
            retry_delay: Duration::from_secs(RETRY_DELAY_SECONDS),
        })
    }

    #[cfg(test)]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Web root of the instance (without `/api/v4`)
    pub fn web_url(&self) -> &Url {
        &self.web_url
    }

    pub(super) fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.api_url.join(path)?)
    }

    fn auth_request(&self, request: RequestBuilder) -> RequestBuilder {
        if let Some(token) = &self.token {
            request.bearer_auth(token.as_str())
        } else {
            request
        }
    }

    /// Sends a request with automatic retry on network errors, rate limits
    /// and server errors. Non-success statuses become `SweepError::Api`.
    async fn send(&self, build: impl Fn() -> RequestBuilder) -> Result<Response> {
        self.send_with(build, false).await
    }

    /// Like [`Self::send`]. With `gone_after_retry`, a 404 that answers a
    /// retry counts as success: an earlier attempt already removed the
    /// resource even though its response was lost.
    async fn send_with(
        &self,
        build: impl Fn() -> RequestBuilder,
        gone_after_retry: bool,
    ) -> Result<Response> {
        // one permit per logical request, held across retries
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| SweepError::Config("HTTP client has been shut down".to_string()))?;

        let mut retry_count = 0;
        loop {
            let response = match self.auth_request(build()).send().await {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    if retry_count >= MAX_RETRIES {
                        return Err(e.into());
                    }
                    warn!(
                        "Network error ({e}), retrying in {}s ({}/{MAX_RETRIES})...",
                        self.retry_delay.as_secs(),
                        retry_count + 1,
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    retry_count += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                if retry_count >= MAX_RETRIES {
                    return Err(SweepError::ApiErrorAfterRetries {
                        status: status.as_u16(),
                        retries: MAX_RETRIES,
                    });
                }

                let delay = retry_after(&response).unwrap_or(self.retry_delay);
                warn!(
                    "GitLab API error (status {status}). Waiting {}s before retry {}/{MAX_RETRIES}...",
                    delay.as_secs(),
                    retry_count + 1,
                );

                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            if gone_after_retry && retry_count > 0 && status == StatusCode::NOT_FOUND {
                debug!("Resource gone after {retry_count} retries, an earlier attempt succeeded");
                return Ok(response);
            }

            if !status.is_success() {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read error response".to_string());
                return Err(SweepError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            return Ok(response);
        }
    }

    pub(super) async fn get_json<T>(&self, url: Url, query: &[(&str, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        debug!("GET {url}");
        let response = self.send(|| self.client.get(url.clone()).query(query)).await?;
        Ok(response.json().await?)
    }

    /// Fetches one page of a listing endpoint and reads the `X-Total` header.
    ///
    /// A response without the header is an error: the caller cannot tell how
    /// many pages exist, and guessing would silently truncate the listing.
    pub(super) async fn get_listing<T>(
        &self,
        url: Url,
        query: &[(&str, String)],
        page: Page,
    ) -> Result<Listing<T>>
    where
        T: DeserializeOwned,
    {
        debug!("GET {url} (page {}, per_page {})", page.number, page.size);
        let paging = [
            ("page", page.number.to_string()),
            ("per_page", page.size.to_string()),
        ];
        let response = self
            .send(|| self.client.get(url.clone()).query(query).query(&paging))
            .await?;

        let total = response
            .headers()
            .get(TOTAL_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<usize>().ok())
            .ok_or_else(|| SweepError::MissingTotal {
                endpoint: url.path().to_string(),
            })?;

        let items = response.json().await?;
        Ok(Listing { items, total })
    }

    pub(super) async fn delete(&self, url: Url) -> Result<()> {
        debug!("DELETE {url}");
        self.send_with(|| self.client.delete(url.clone()), true)
            .await?;
        Ok(())
    }
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Splits a user supplied base URL into the instance web root and the v4 API
/// root, both ending in `/`.
fn split_base_url(base_url: &str) -> Result<(Url, Url)> {
    let mut web_url = Url::parse(base_url.trim())?;
    if !matches!(web_url.scheme(), "http" | "https") {
        return Err(SweepError::Config(format!(
            "GitLab URL must use http or https: {base_url}"
        )));
    }

    let root = web_url
        .path()
        .trim_end_matches('/')
        .trim_end_matches("/api/v4")
        .to_string();
    web_url.set_path(&format!("{root}/"));
    web_url.set_query(None);

    let api_url = web_url.join("api/v4/")?;
    Ok((web_url, api_url))
}
