use std::time::Duration;
use std::time::Instant;

use anyhow::Result;

use super::Mock;
use super::MOCK_RESPONSE;
use crate::domain::models::Backend;
use crate::domain::models::ModelName;

#[tokio::test]
async fn it_answers_with_the_mock_response() -> Result<()> {
    let backend = Mock::load(ModelName::Mock1, 30, Duration::ZERO).await;
    assert_eq!(backend.generate("hello").await?, MOCK_RESPONSE);
    assert_eq!(backend.generate("anything else").await?, "Mock response");

    return Ok(());
}

#[tokio::test]
async fn it_keeps_its_name() {
    let backend = Mock::load(ModelName::Mock2, 30, Duration::ZERO).await;
    assert_eq!(backend.name(), ModelName::Mock2);
}

#[tokio::test]
async fn it_sets_max_length() {
    let mut backend = Mock::load(ModelName::Mock1, 30, Duration::ZERO).await;
    assert_eq!(backend.max_length(), 30);

    backend.set_max_length(120);
    assert_eq!(backend.max_length(), 120);
}

#[tokio::test]
async fn it_passes_health_checks() {
    let backend = Mock::load(ModelName::Mock1, 30, Duration::ZERO).await;
    assert!(backend.health_check().await.is_ok());
}

#[tokio::test]
async fn it_waits_for_the_configured_delay() -> Result<()> {
    let backend = Mock::load(ModelName::Mock1, 30, Duration::from_millis(20)).await;

    let started = Instant::now();
    backend.generate("hello").await?;
    assert!(started.elapsed() >= Duration::from_millis(20));

    return Ok(());
}
