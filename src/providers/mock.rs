use std::time::Duration;

use tracing::info;

use crate::providers::{ImageProvider, ProviderError, SceneImage};

const MOCK_IMAGE_URL: &str = "https://fal.media/files/penguin/OhNORVhHSIOfTpCvsbnAa_image.webp";

/// Offline stand-in used when no FAL_API_KEY is configured. Returns a canned
/// placeholder after a short delay so the client-side loading flow still
/// exercises.
pub struct MockProvider {
    delay: Duration,
}

impl MockProvider {
    pub fn new(delay_ms: u64) -> Self {
        MockProvider {
            delay: Duration::from_millis(delay_ms),
        }
    }
}

#[async_trait::async_trait]
impl ImageProvider for MockProvider {
    async fn upload_image(&self, _bytes: &[u8], mime: &str) -> Result<String, ProviderError> {
        Ok(format!("data:{mime};base64,"))
    }

    async fn generate_scene(
        &self,
        prompt: &str,
        _image_url: &str,
    ) -> Result<SceneImage, ProviderError> {
        let preview: String = prompt.chars().take(150).collect();
        info!("Mock generation, prompt: {preview}...");
        tokio::time::sleep(self.delay).await;
        Ok(SceneImage {
            url: MOCK_IMAGE_URL.to_string(),
            request_id: None,
        })
    }

    async fn swap_face(
        &self,
        target_url: &str,
        _selfie_url: &str,
    ) -> Result<String, ProviderError> {
        Ok(target_url.to_string())
    }

    fn is_mock(&self) -> bool {
        true
    }
}
