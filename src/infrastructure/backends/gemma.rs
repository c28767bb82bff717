#[cfg(test)]
#[path = "gemma_test.rs"]
mod tests;

use std::time::Duration;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use crate::domain::models::Backend;
use crate::domain::models::ModelName;

const BOS_MARKER: &str = "<bos>";
const EOS_MARKER: &str = "<eos>";

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct GenerateParameters {
    max_new_tokens: usize,
    return_full_text: bool,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct GenerateRequest {
    inputs: String,
    parameters: GenerateParameters,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct GenerateResponse {
    generated_text: String,
}

/// Drops the sequence markers the Gemma tokenizer leaves around decoded text.
fn strip_markers(text: &str) -> &str {
    let text = text.strip_prefix(BOS_MARKER).unwrap_or(text);
    return text.strip_suffix(EOS_MARKER).unwrap_or(text);
}

/// Gemma 2B served by a text-generation server, decoded as a causal LM with
/// the prompt echoed back at the start of the reply.
pub struct Gemma {
    url: String,
    timeout: Duration,
    max_length: usize,
}

impl Gemma {
    pub fn new(url: &str, timeout: Duration, max_length: usize) -> Gemma {
        return Gemma {
            url: url.trim_end_matches('/').to_string(),
            timeout,
            max_length,
        };
    }
}

#[async_trait]
impl Backend for Gemma {
    fn name(&self) -> ModelName {
        return ModelName::Gemma;
    }

    #[allow(clippy::implicit_return)]
    async fn health_check(&self) -> Result<()> {
        let res = reqwest::Client::new()
            .get(format!("{url}/health", url = self.url))
            .timeout(self.timeout)
            .send()
            .await;

        if let Err(err) = res {
            tracing::error!(error = ?err, url = self.url.as_str(), "Gemma server is not running");
            bail!(format!("Gemma server is not running at {}", self.url));
        }

        let res = res?;
        if !res.status().is_success() {
            tracing::error!(status = res.status().as_u16(), "Gemma health check failed");
            bail!(format!(
                "Gemma health check failed with status {}",
                res.status().as_u16()
            ));
        }

        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let req = GenerateRequest {
            inputs: prompt.to_string(),
            parameters: GenerateParameters {
                max_new_tokens: self.max_length,
                return_full_text: true,
            },
        };

        let res = reqwest::Client::new()
            .post(format!("{url}/generate", url = self.url))
            .json(&req)
            .send()
            .await?;

        if !res.status().is_success() {
            tracing::error!(
                status = res.status().as_u16(),
                "Failed to make generate request to Gemma"
            );
            bail!(format!(
                "Gemma generate request failed with status {}",
                res.status().as_u16()
            ));
        }

        let body = res.json::<GenerateResponse>().await?;
        tracing::debug!(body = ?body, "Generate response");

        return Ok(strip_markers(&body.generated_text).to_string());
    }

    fn max_length(&self) -> usize {
        return self.max_length;
    }

    fn set_max_length(&mut self, max_length: usize) {
        self.max_length = max_length;
    }
}
