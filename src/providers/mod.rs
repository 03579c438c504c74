pub mod fal;
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

pub use fal::FalProvider;
pub use mock::MockProvider;

/// Typed upstream failure taxonomy. The HTTP layer maps each variant to a
/// response status; stage-2 callers downgrade all of them to a fallback.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("AI service authentication failed. Please contact support.")]
    Unauthorized,
    #[error("AI service is busy. Please try again in a few seconds.")]
    RateLimited,
    #[error("The image was flagged by our safety system. Please try a different photo.")]
    SafetyFiltered,
    #[error("The AI service could not process the supplied image: {0}")]
    Unprocessable(String),
    #[error("AI generation timed out ({0}s limit). Please try again.")]
    Timeout(u64),
    #[error("No image returned from AI")]
    NoImage,
    #[error("AI generation failed: {0}")]
    Upstream(String),
}

/// Last-resort classification of a free-text upstream error message.
/// Substring matching is fragile ("download" or "422" can appear in
/// unrelated messages); typed variants from status codes take precedence
/// wherever the provider gives us one.
pub fn classify_upstream_message(message: &str) -> ProviderError {
    if message.contains("401") || message.contains("Unauthorized") || message.contains("Invalid API")
    {
        return ProviderError::Unauthorized;
    }
    if message.contains("429") || message.contains("rate limit") || message.contains("Too Many") {
        return ProviderError::RateLimited;
    }
    if message.contains("NSFW") || message.contains("safety") || message.contains("content_filter")
    {
        return ProviderError::SafetyFiltered;
    }
    if message.contains("422") || message.contains("download") {
        let truncated: String = message.chars().take(200).collect();
        return ProviderError::Unprocessable(truncated);
    }
    let truncated: String = message.chars().take(200).collect();
    ProviderError::Upstream(truncated)
}

/// Stage-1 output plus whatever metadata the provider reported with it.
#[derive(Debug, Clone)]
pub struct SceneImage {
    pub url: String,
    pub request_id: Option<String>,
}

/// External image pipeline, selected once at startup: `FalProvider` when an
/// API key is configured, `MockProvider` otherwise.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Pushes image bytes somewhere the generation model can fetch them and
    /// returns the resulting URL (possibly a data URI).
    async fn upload_image(&self, bytes: &[u8], mime: &str) -> Result<String, ProviderError>;

    /// Stage 1: text+image to composite scene image.
    async fn generate_scene(
        &self,
        prompt: &str,
        image_url: &str,
    ) -> Result<SceneImage, ProviderError>;

    /// Stage 2: replace the generated fan face with the selfie face.
    async fn swap_face(
        &self,
        target_url: &str,
        selfie_url: &str,
    ) -> Result<String, ProviderError>;

    fn is_mock(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_maps_the_documented_substrings() {
        assert!(matches!(
            classify_upstream_message("upstream said 429 slow down"),
            ProviderError::RateLimited
        ));
        assert!(matches!(
            classify_upstream_message("flagged as NSFW by filter"),
            ProviderError::SafetyFiltered
        ));
        assert!(matches!(
            classify_upstream_message("401 Unauthorized"),
            ProviderError::Unauthorized
        ));
        assert!(matches!(
            classify_upstream_message("Invalid API key supplied"),
            ProviderError::Unauthorized
        ));
        assert!(matches!(
            classify_upstream_message("rate limit exceeded"),
            ProviderError::RateLimited
        ));
        assert!(matches!(
            classify_upstream_message("content_filter triggered"),
            ProviderError::SafetyFiltered
        ));
        assert!(matches!(
            classify_upstream_message("could not download input image"),
            ProviderError::Unprocessable(_)
        ));
        assert!(matches!(
            classify_upstream_message("status 422 unprocessable"),
            ProviderError::Unprocessable(_)
        ));
        assert!(matches!(
            classify_upstream_message("some exotic explosion"),
            ProviderError::Upstream(_)
        ));
    }

    #[test]
    fn classifier_truncates_long_messages() {
        let long = format!("boom {}", "x".repeat(500));
        match classify_upstream_message(&long) {
            ProviderError::Upstream(msg) => assert!(msg.chars().count() <= 200),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
