// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Copilot driver — vendor-OAuth variant layered over the shared
//! [`OpenAICompatProvider`].
//!
//! GitHub Copilot does not accept a long-lived API key directly. Instead a
//! long-lived OAuth token (read from `GITHUB_TOKEN`; a CLI device-code
//! exchange is a documented extension point, not implemented here) is
//! exchanged for a short-lived capability token that is attached as a bearer
//! token on every chat-completions request. The capability token is cached
//! and refreshed when fewer than 60 seconds remain before expiry; a `401`
//! response invalidates the cache so the next call re-exchanges it.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::{
    catalog::ModelCatalogEntry,
    openai_compat::{AuthStyle, OpenAICompatProvider},
    provider::ResponseStream,
    CompletionRequest,
};

const TOKEN_EXCHANGE_URL: &str = "https://api.github.com/copilot_internal/v2/token";
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
    token: String,
    expires_at: i64,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Holds the current capability token, refreshing it on demand.
struct TokenCache {
    oauth_token: String,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    fn new(oauth_token: String) -> Self {
        Self {
            oauth_token,
            client: reqwest::Client::new(),
            cached: Mutex::new(None),
        }
    }

    /// Invalidate the cache, e.g. after a 401 from the chat endpoint.
    async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    /// Return a valid capability token, exchanging for a fresh one if the
    /// cached token is missing or within `REFRESH_MARGIN` of expiry.
    async fn get(&self) -> anyhow::Result<String> {
        {
            let guard = self.cached.lock().await;
            if let Some(c) = guard.as_ref() {
                if c.expires_at.saturating_duration_since(Instant::now()) > REFRESH_MARGIN {
                    return Ok(c.token.clone());
                }
            }
        }
        let resp = self
            .client
            .get(TOKEN_EXCHANGE_URL)
            .bearer_auth(&self.oauth_token)
            .header("Accept", "application/json")
            .send()
            .await?
            .error_for_status()?
            .json::<TokenExchangeResponse>()
            .await?;

        let now_unix = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        let ttl = (resp.expires_at - now_unix).max(0) as u64;
        let expires_at = Instant::now() + Duration::from_secs(ttl);

        *self.cached.lock().await = Some(CachedToken {
            token: resp.token.clone(),
            expires_at,
        });
        Ok(resp.token)
    }
}

/// GitHub Copilot chat-completions driver.
pub struct CopilotProvider {
    model: String,
    base_url: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    driver_options: serde_json::Value,
    tokens: TokenCache,
}

impl CopilotProvider {
    pub fn new(
        model: String,
        oauth_token: String,
        base_url: Option<String>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
        driver_options: serde_json::Value,
    ) -> Self {
        Self {
            model,
            base_url: base_url.unwrap_or_else(|| "https://api.githubcopilot.com".to_string()),
            max_tokens,
            temperature,
            driver_options,
            tokens: TokenCache::new(oauth_token),
        }
    }

    fn editor_headers() -> Vec<(String, String)> {
        vec![
            ("Editor-Version".to_string(), "marvin/0.1.0".to_string()),
            (
                "Editor-Plugin-Version".to_string(),
                "marvin-agent/0.1.0".to_string(),
            ),
            ("Copilot-Integration-Id".to_string(), "marvin".to_string()),
        ]
    }

    async fn build_inner(&self) -> anyhow::Result<OpenAICompatProvider> {
        let token = self.tokens.get().await?;
        Ok(OpenAICompatProvider::with_full_chat_url(
            "copilot",
            self.model.clone(),
            Some(token),
            format!("{}/chat/completions", self.base_url.trim_end_matches('/')),
            self.max_tokens,
            self.temperature,
            Self::editor_headers(),
            AuthStyle::Bearer,
            self.driver_options.clone(),
        ))
    }
}

#[async_trait]
impl crate::ModelProvider for CopilotProvider {
    fn name(&self) -> &str {
        "copilot"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn list_models(&self) -> anyhow::Result<Vec<ModelCatalogEntry>> {
        let inner = self.build_inner().await?;
        inner.list_models().await
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        let inner = self.build_inner().await?;
        match inner.complete(req).await {
            Ok(stream) => Ok(stream),
            Err(e) => {
                if e.to_string().contains("401") {
                    self.tokens.invalidate().await;
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn token_cache_starts_empty_and_exchanges_on_first_get() {
        // No network in unit tests; just verify the cache shape compiles and
        // an empty cache is correctly detected as needing a refresh.
        let cache = TokenCache::new("gho_fake".to_string());
        assert!(cache.cached.lock().await.is_none());
    }

    #[test]
    fn editor_headers_include_integration_id() {
        let headers = CopilotProvider::editor_headers();
        assert!(headers.iter().any(|(k, _)| k == "Copilot-Integration-Id"));
        assert!(headers.iter().any(|(k, _)| k == "Editor-Version"));
    }
}
