// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Ollama driver — thin wrapper around the shared [`OpenAICompatProvider`].
//!
//! Ollama serves a subset of the OpenAI chat-completions wire format on a
//! local port and needs no API key.

use async_trait::async_trait;

use crate::{
    catalog::ModelCatalogEntry,
    openai_compat::{AuthStyle, OpenAICompatProvider},
    provider::ResponseStream,
    CompletionRequest,
};

/// Ollama chat-completions driver.
pub struct OllamaProvider {
    inner: OpenAICompatProvider,
}

impl OllamaProvider {
    pub fn new(
        model: String,
        base_url: Option<String>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
        driver_options: serde_json::Value,
    ) -> Self {
        Self {
            inner: OpenAICompatProvider::new(
                "ollama",
                model,
                None,
                base_url
                    .as_deref()
                    .unwrap_or("http://localhost:11434/v1"),
                max_tokens,
                temperature,
                vec![],
                AuthStyle::None,
                driver_options,
            ),
        }
    }
}

#[async_trait]
impl crate::ModelProvider for OllamaProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    async fn list_models(&self) -> anyhow::Result<Vec<ModelCatalogEntry>> {
        self.inner.list_models().await
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        self.inner.complete(req).await
    }
}
