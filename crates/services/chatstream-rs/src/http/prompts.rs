//! Quick prompts API.

use crate::error::Result;
use crate::http::HttpClient;
use crate::types::QuickPrompt;

/// Quick prompts API client.
#[derive(Debug, Clone)]
pub struct PromptsApi {
    http: HttpClient,
}

impl PromptsApi {
    /// Create a new Quick prompts API client.
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// List the canned prompts.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list(&self) -> Result<Vec<QuickPrompt>> {
        self.http.get("/quick-prompts").await
    }
}
