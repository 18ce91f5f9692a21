//! Client for the provider's email-content-fetch API.
//!
//! The webhook only carries envelope metadata; headers and bodies are pulled
//! separately by `email_id`. Responses may be partial (null headers, text or
//! html) and the caller must tolerate that.

use std::collections::HashMap;

use serde::Deserialize;

use crate::config::ProviderConfig;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailContent {
    pub headers: Option<HashMap<String, String>>,
    pub text: Option<String>,
    pub html: Option<String>,
}

#[derive(Clone)]
pub struct EmailContentClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl EmailContentClient {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    pub async fn fetch(&self, email_id: &str) -> Result<EmailContent, reqwest::Error> {
        let url = format!("{}/emails/{}", self.base_url, email_id);
        self.http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?
            .error_for_status()?
            .json::<EmailContent>()
            .await
    }
}
