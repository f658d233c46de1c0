//! HTTP page fetching

use crate::error::Result;

/// Fetches page bodies over HTTP
pub struct PageFetcher {
    client: reqwest::Client,
}

impl PageFetcher {
    /// Create a new fetcher with the given user agent
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }

    /// Fetch a page and return its body as a string
    ///
    /// Non-success status codes are treated as errors.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        log::info!("Fetching page: {}", url);

        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.text().await?;

        log::debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetcher_creation() {
        let fetcher = PageFetcher::new("askpage-test/0.1");
        assert!(fetcher.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let fetcher = PageFetcher::new("askpage-test/0.1").unwrap();
        let result = fetcher.fetch("not a url").await;
        assert!(result.is_err());
    }
}
