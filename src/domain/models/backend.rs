#[cfg(test)]
#[path = "backend_test.rs"]
mod tests;

use anyhow::Result;
use async_trait::async_trait;
use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;
use strum::VariantNames;

use super::ChatError;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, EnumIter, EnumVariantNames, strum::Display)]
pub enum ModelName {
    #[strum(serialize = "mock1")]
    Mock1,
    #[strum(serialize = "mock2")]
    Mock2,
    #[strum(serialize = "gemma")]
    Gemma,
}

impl ModelName {
    pub fn parse(text: &str) -> Result<ModelName> {
        if let Some(name) = ModelName::iter().find(|e| return e.to_string() == text) {
            return Ok(name);
        }

        return Err(ChatError::ModelNotFound {
            name: text.to_string(),
            available: ModelName::VARIANTS.join(", "),
        }
        .into());
    }
}

#[async_trait]
pub trait Backend {
    fn name(&self) -> ModelName;

    /// Used when constructing the backend to verify the model can actually
    /// serve requests.
    async fn health_check(&self) -> Result<()>;

    /// Produces a full reply for `prompt`. May block for as long as inference
    /// takes, there is no timeout.
    async fn generate(&self, prompt: &str) -> Result<String>;

    fn max_length(&self) -> usize;

    fn set_max_length(&mut self, max_length: usize);
}

pub type BackendBox = Box<dyn Backend + Send + Sync>;

/// Builds backends for the session. Swapping a model goes through here, so
/// tests can count how often a backend gets constructed.
#[async_trait]
pub trait BackendFactory {
    async fn create(&self, name: ModelName, max_length: usize) -> Result<BackendBox>;
}

pub type BackendFactoryBox = Box<dyn BackendFactory + Send + Sync>;
