//! Ollama-backed capabilities.
//!
//! One HTTP client serves both the generation endpoint (`/api/generate`) and
//! the embedding endpoint (`/api/embeddings`) of a local Ollama server.

use crate::capability::{Embedder, GenerateOptions, LocalModel};
use crate::config::OllamaConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    embedding_model: String,
    timeout: Duration,
    probe_timeout: Duration,
}

impl OllamaClient {
    pub fn new(config: &OllamaConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            embedding_model: config.embedding_model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Whether the server answers and has `model` pulled.
    async fn has_model(&self, model: &str) -> bool {
        match self.list_models().await {
            Ok(models) => {
                let found = models.iter().any(|name| model_matches(name, model));
                if !found {
                    warn!("Ollama is up but model '{model}' is not pulled (available: {models:?})");
                }
                found
            }
            Err(e) => {
                debug!("Ollama not reachable: {e:#}");
                false
            }
        }
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(self.probe_timeout)
            .send()
            .await
            .context("Ollama tags request failed")?
            .error_for_status()
            .context("Ollama tags request rejected")?;

        let tags: TagsResponse = response
            .json()
            .await
            .context("Failed to parse Ollama tags response")?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

/// `llama3.2` matches `llama3.2:latest`; an explicit tag must match exactly.
fn model_matches(available: &str, wanted: &str) -> bool {
    available == wanted
        || (!wanted.contains(':') && available.split(':').next() == Some(wanted))
}

#[async_trait]
impl LocalModel for OllamaClient {
    async fn is_available(&self) -> bool {
        self.has_model(&self.model).await
    }

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            system: options.system.as_deref(),
            stream: false,
            format: "json",
            options: RequestOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        };

        debug!("Sending generate request to Ollama model '{}'", self.model);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await
            .context("Ollama generate request failed")?
            .error_for_status()
            .context("Ollama generate request rejected")?;

        let body: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse Ollama generate response")?;

        debug!("Ollama answered with {} characters", body.response.len());
        Ok(body.response)
    }
}

#[async_trait]
impl Embedder for OllamaClient {
    async fn is_available(&self) -> bool {
        self.has_model(&self.embedding_model).await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await
            .context("Ollama embedding request failed")?
            .error_for_status()
            .context("Ollama embedding request rejected")?;

        let body: EmbeddingResponse = response
            .json()
            .await
            .context("Failed to parse Ollama embedding response")?;

        if body.embedding.is_empty() {
            anyhow::bail!("Ollama returned an empty embedding for model '{}'", self.embedding_model);
        }
        Ok(body.embedding)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    format: &'a str,
    options: RequestOptions,
}

#[derive(Debug, Serialize)]
struct RequestOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_matching_with_tags() {
        assert!(model_matches("llama3.2:latest", "llama3.2"));
        assert!(model_matches("llama3.2:3b", "llama3.2:3b"));
        assert!(!model_matches("llama3.2:latest", "llama3.2:3b"));
        assert!(!model_matches("llama3.1:latest", "llama3.2"));
    }

    #[test]
    fn test_generate_request_shape() {
        let request = GenerateRequest {
            model: "m",
            prompt: "p",
            system: None,
            stream: false,
            format: "json",
            options: RequestOptions {
                temperature: 0.3,
                num_predict: Some(200),
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["format"], "json");
        assert_eq!(json["options"]["num_predict"], 200);
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let config = OllamaConfig {
            base_url: "http://localhost:11434/".to_string(),
            ..OllamaConfig::default()
        };
        let client = OllamaClient::new(&config);
        assert_eq!(client.base_url, "http://localhost:11434");
        assert_eq!(client.model(), config.model);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        let config = OllamaConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            probe_timeout_secs: 1,
            ..OllamaConfig::default()
        };
        let client = OllamaClient::new(&config);
        assert!(!LocalModel::is_available(&client).await);
        assert!(!Embedder::is_available(&client).await);
    }
}
