#[cfg(test)]
#[path = "manager_test.rs"]
mod tests;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use super::gemma::Gemma;
use super::mock::Mock;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::BackendBox;
use crate::domain::models::BackendFactory;
use crate::domain::models::ChatError;
use crate::domain::models::ModelName;

pub struct BackendManager {
    mock_delay: Duration,
    gemma_url: String,
    health_check_timeout: Duration,
}

impl BackendManager {
    pub fn from_config() -> Result<BackendManager> {
        return Ok(BackendManager {
            mock_delay: Duration::from_millis(Config::get_usize(ConfigKey::MockDelay)? as u64),
            gemma_url: Config::get(ConfigKey::GemmaURL),
            health_check_timeout: Duration::from_millis(
                Config::get_usize(ConfigKey::BackendHealthCheckTimeout)? as u64,
            ),
        });
    }
}

#[async_trait]
impl BackendFactory for BackendManager {
    #[allow(clippy::implicit_return)]
    async fn create(&self, name: ModelName, max_length: usize) -> Result<BackendBox> {
        let backend: BackendBox = match name {
            ModelName::Mock1 | ModelName::Mock2 => {
                Box::new(Mock::load(name, max_length, self.mock_delay).await)
            }
            ModelName::Gemma => Box::new(Gemma::new(
                &self.gemma_url,
                self.health_check_timeout,
                max_length,
            )),
        };

        if let Err(err) = backend.health_check().await {
            return Err(ChatError::ModelUnavailable {
                name: name.to_string(),
                reason: format!("{err:#}"),
            }
            .into());
        }

        tracing::info!(model = %name, max_length, "Model loaded");
        return Ok(backend);
    }
}
