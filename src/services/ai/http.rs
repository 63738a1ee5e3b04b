use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

use super::{AiProvider, EmbeddingInput, ModerationInput, ModerationVerdict};

pub struct HttpAiProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpAiProvider {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.post(format!("{}{}", self.base_url, path));
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }
        req
    }
}

#[async_trait]
impl AiProvider for HttpAiProvider {
    async fn moderate(&self, input: &ModerationInput) -> anyhow::Result<ModerationVerdict> {
        let resp = self
            .post("/v1/moderate")
            .json(input)
            .send()
            .await
            .context("failed to call moderation service")?
            .error_for_status()
            .context("moderation service returned error")?;

        let verdict: ModerationVerdict = resp
            .json()
            .await
            .context("failed to parse moderation response")?;
        Ok(verdict)
    }

    async fn embed(&self, input: &EmbeddingInput) -> anyhow::Result<Vec<f32>> {
        let resp = self
            .post("/v1/embeddings")
            .json(input)
            .send()
            .await
            .context("failed to call embedding service")?
            .error_for_status()
            .context("embedding service returned error")?;

        let data: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse embedding response")?;

        let values = data["embedding"]
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("missing embedding in response"))?;

        values
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| anyhow::anyhow!("non-numeric embedding component"))
            })
            .collect()
    }

    async fn suggest_category(
        &self,
        title: &str,
        description: &str,
    ) -> anyhow::Result<Vec<String>> {
        let body = json!({
            "title": title,
            "description": description,
        });

        let resp = self
            .post("/v1/suggest-category")
            .json(&body)
            .send()
            .await
            .context("failed to call category suggestion service")?
            .error_for_status()
            .context("category suggestion service returned error")?;

        let data: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse category suggestion response")?;

        let path = data["path"]
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("missing path in category suggestion response"))?;

        Ok(path
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect())
    }
}
