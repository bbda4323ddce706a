//! HTTP plumbing for the room API.
//!
//! A thin wrapper around `reqwest` with middleware support for
//! exponential backoff retries and standardized JSON response handling.
//! Transient transport faults are retried inside the middleware; a non-2xx
//! status is an authoritative answer and is returned, not retried.

use std::time::Duration;

use reqwest::{Method, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Error;

/// Request timeout; polling must never hang a tick indefinitely.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Transient retries before a transport error surfaces.
const MAX_RETRIES: u32 = 3;

/// Deserialized body plus the transaction metadata callers need to map
/// statuses onto the error taxonomy.
#[derive(Debug)]
pub struct ApiResponse<T> {
    /// The successfully deserialized response body, if any.
    pub data: Option<T>,
    /// The raw error body returned by the server when the request failed.
    pub error_body: Option<String>,
    /// The numeric HTTP status code.
    pub status: u16,
    /// Indicates if the status code was in the 2xx range.
    pub success: bool,
}

/// Asynchronous JSON API client with a retry policy.
pub struct ApiClient {
    inner: ClientWithMiddleware,
    base_url: Url,
}

impl ApiClient {
    /// Creates a client rooted at `base_url`.
    ///
    /// The base URL must be absolute; give it a trailing slash when it
    /// carries a path, so relative endpoint paths join underneath it.
    pub fn new(base_url: &str) -> Result<Self, Error> {
        let url = Url::parse(base_url)
            .map_err(|e| Error::Transport(format!("invalid base url {base_url:?}: {e}")))?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(MAX_RETRIES);
        let inner = ClientBuilder::new(
            reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .user_agent("planning-poker-client/0.1")
                .build()
                .map_err(|e| Error::Transport(e.to_string()))?,
        )
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build();

        Ok(Self { inner, base_url: url })
    }

    /// Performs a request against `path` (relative to the base URL) and
    /// captures the outcome without treating non-2xx as a transport error.
    pub async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<ApiResponse<T>, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let full_url = self
            .base_url
            .join(path)
            .map_err(|e| Error::Transport(format!("invalid endpoint path {path:?}: {e}")))?;

        let mut req = self.inner.request(method, full_url);
        if let Some(body) = body {
            req = req.json(body);
        }

        let response = req.send().await?;
        let status = response.status();
        let success = status.is_success();

        if success {
            let data = response.json::<T>().await?;
            Ok(ApiResponse {
                data: Some(data),
                error_body: None,
                status: status.as_u16(),
                success,
            })
        } else {
            let error_body = response.text().await.ok();
            Ok(ApiResponse {
                data: None,
                error_body,
                status: status.as_u16(),
                success,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_relative_base_urls() {
        assert!(matches!(
            ApiClient::new("not-a-url"),
            Err(Error::Transport(_))
        ));
        assert!(ApiClient::new("http://localhost:3222/").is_ok());
    }
}
