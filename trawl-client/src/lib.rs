//! Trawl HTTP Client
//!
//! A small, typed HTTP client for the Twitter REST API endpoints the ingester
//! relies on: statuses by id, users by id or screen name, and tweet search.
//!
//! Rate-limit rejections surface as [`ClientError::ApiError`] with status 429
//! and are detected with [`ClientError::is_rate_limited`].
//!
//! # Example
//!
//! ```no_run
//! use trawl_client::TwitterClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = TwitterClient::new("https://api.twitter.com", "bearer-token");
//!
//!     let tweet = client.get_tweet("572342978255048705").await?;
//!     println!("Fetched tweet by {:?}", tweet.user_id);
//!     Ok(())
//! }
//! ```

pub mod error;
mod payload;
mod search;
mod tweets;
mod users;

// Re-export commonly used types
pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the upstream Twitter API
///
/// Requests are authenticated with an application bearer token; acquiring that
/// token is the caller's responsibility.
#[derive(Debug, Clone)]
pub struct TwitterClient {
    /// Base URL of the API (e.g., "https://api.twitter.com")
    base_url: String,
    /// Application bearer token
    bearer_token: String,
    /// HTTP client instance
    client: Client,
}

impl TwitterClient {
    /// Create a new upstream client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the API (e.g., "https://api.twitter.com")
    /// * `bearer_token` - Application bearer token sent with every request
    ///
    /// # Example
    /// ```
    /// use trawl_client::TwitterClient;
    ///
    /// let client = TwitterClient::new("https://api.twitter.com", "token");
    /// ```
    pub fn new(base_url: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self::with_client(base_url, bearer_token, Client::new())
    }

    /// Create a new upstream client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(
        base_url: impl Into<String>,
        bearer_token: impl Into<String>,
        client: Client,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token: bearer_token.into(),
            client,
        }
    }

    /// Get the base URL of the API
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Send an authenticated GET request and deserialize the JSON body
    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .query(query)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Handle an API response and deserialize JSON
    ///
    /// This method checks the status code and returns an appropriate error if
    /// the request failed, or deserializes the response body if successful.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}
