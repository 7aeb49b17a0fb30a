//! Posts API
//!
//! Fetch functions for the posts resource, shaped to plug into
//! [`QueryClient::subscribe`](crate::QueryClient::subscribe).

use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::error::FetchError;
use crate::models::Post;

/// HTTP client bound to one posts API base URL.
#[derive(Debug, Clone)]
pub struct PostsApi {
    client: Client,
    base_url: String,
}

impl PostsApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn posts_url(&self) -> String {
        format!("{}/posts", self.base_url)
    }

    pub fn post_url(&self, id: u64) -> String {
        format!("{}/posts/{}", self.base_url, id)
    }

    // == Fetchers ==
    /// GET `/posts`.
    pub async fn fetch_posts(&self) -> Result<Vec<Post>, FetchError> {
        self.get_json(&self.posts_url()).await
    }

    /// GET `/posts/{id}`.
    pub async fn fetch_post(&self, id: u64) -> Result<Post, FetchError> {
        self.get_json(&self.post_url(id)).await
    }

    /// Transport errors, non-success statuses and decode failures all become
    /// a single [`FetchError`].
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::new(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(format!("{} returned {}", url, status)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FetchError::new(format!("invalid response from {}: {}", url, e)))
    }
}
