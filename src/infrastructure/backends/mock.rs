#[cfg(test)]
#[path = "mock_test.rs"]
mod tests;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::time;

use crate::domain::models::Backend;
use crate::domain::models::ModelName;

pub const MOCK_RESPONSE: &str = "Mock response";

/// Stand-in model that answers every prompt with the same text. Loading and
/// generating both wait `delay` to mimic a real model's latency.
pub struct Mock {
    name: ModelName,
    max_length: usize,
    delay: Duration,
}

impl Mock {
    pub async fn load(name: ModelName, max_length: usize, delay: Duration) -> Mock {
        time::sleep(delay).await;
        tracing::info!(model = %name, "Mock model loaded");

        return Mock {
            name,
            max_length,
            delay,
        };
    }
}

#[async_trait]
impl Backend for Mock {
    fn name(&self) -> ModelName {
        return self.name;
    }

    #[allow(clippy::implicit_return)]
    async fn health_check(&self) -> Result<()> {
        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn generate(&self, prompt: &str) -> Result<String> {
        tracing::debug!(model = %self.name, prompt, max_length = self.max_length, "Mock generate");
        time::sleep(self.delay).await;

        return Ok(MOCK_RESPONSE.to_string());
    }

    fn max_length(&self) -> usize {
        return self.max_length;
    }

    fn set_max_length(&mut self, max_length: usize) {
        self.max_length = max_length;
    }
}
