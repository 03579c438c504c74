use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::Config;
use crate::providers::{classify_upstream_message, ImageProvider, ProviderError, SceneImage};
use crate::utils::http::get_http_client;
use crate::utils::media::truncate_for_log;
use crate::utils::timing::log_provider_timing;

const FAL_RUN_BASE_URL: &str = "https://fal.run";
const FAL_STORAGE_INITIATE_URL: &str = "https://rest.alpha.fal.ai/storage/upload/initiate";
const ERROR_BODY_LOG_LIMIT: usize = 800;

/// fal.ai client for the two pipeline stages. Each call is raced against a
/// wall-clock timeout; there are no retries, an error or timeout terminates
/// the stage.
pub struct FalProvider {
    api_key: String,
    scene_model: String,
    face_swap_model: String,
    scene_timeout: Duration,
    swap_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct FalImage {
    url: String,
    #[allow(dead_code)]
    content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FalKontextResult {
    images: Option<Vec<FalImage>>,
    has_nsfw_concepts: Option<Vec<bool>>,
    request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FalFaceSwapResult {
    image: Option<FalImage>,
    images: Option<Vec<FalImage>>,
}

#[derive(Debug, Deserialize)]
struct FalUploadInitiateResponse {
    upload_url: String,
    file_url: String,
}

impl FalProvider {
    pub fn new(config: &Config) -> Self {
        FalProvider {
            api_key: config.fal_api_key.clone(),
            scene_model: config.fal_scene_model.clone(),
            face_swap_model: config.fal_face_swap_model.clone(),
            scene_timeout: Duration::from_secs(config.scene_timeout_secs),
            swap_timeout: Duration::from_secs(config.face_swap_timeout_secs),
        }
    }

    fn classify_status(status: StatusCode, body: &str) -> ProviderError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Unauthorized,
            StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited,
            StatusCode::UNPROCESSABLE_ENTITY => {
                let truncated: String = body.chars().take(200).collect();
                ProviderError::Unprocessable(truncated)
            }
            _ => classify_upstream_message(body),
        }
    }

    async fn run_model(
        &self,
        model: &str,
        payload: serde_json::Value,
        budget: Duration,
    ) -> Result<(StatusCode, String), ProviderError> {
        let client = get_http_client();
        let url = format!("{FAL_RUN_BASE_URL}/{model}");

        let send = client
            .post(&url)
            .header("Authorization", format!("Key {}", self.api_key))
            .timeout(budget)
            .json(&payload)
            .send();

        let response = match timeout(budget, send).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                if err.is_timeout() {
                    return Err(ProviderError::Timeout(budget.as_secs()));
                }
                warn!(
                    "fal request to {model} failed to send: {err} (connect={})",
                    err.is_connect()
                );
                return Err(classify_upstream_message(&err.to_string()));
            }
            Err(_) => return Err(ProviderError::Timeout(budget.as_secs())),
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            warn!(
                "fal API error from {model}: status={}, body={}",
                status,
                truncate_for_log(&body, ERROR_BODY_LOG_LIMIT)
            );
            return Err(Self::classify_status(status, &body));
        }

        debug!(target: "providers.fal", model = model, body = %truncate_for_log(&body, 2000));
        Ok((status, body))
    }
}

#[async_trait::async_trait]
impl ImageProvider for FalProvider {
    /// Tries the fal storage account first so the model fetches a short URL;
    /// falls back to an inline data URI when the upload path degrades.
    async fn upload_image(&self, bytes: &[u8], mime: &str) -> Result<String, ProviderError> {
        let client = get_http_client();

        let initiate = client
            .post(FAL_STORAGE_INITIATE_URL)
            .header("Authorization", format!("Key {}", self.api_key))
            .json(&json!({
                "content_type": mime,
                "file_name": "selfie",
            }))
            .send()
            .await;

        let initiated: Option<FalUploadInitiateResponse> = match initiate {
            Ok(response) if response.status().is_success() => response.json().await.ok(),
            Ok(response) => {
                warn!(
                    "fal storage initiate failed with status {}; falling back to data URI",
                    response.status()
                );
                None
            }
            Err(err) => {
                warn!("fal storage initiate failed: {err}; falling back to data URI");
                None
            }
        };

        if let Some(initiated) = initiated {
            let uploaded = client
                .put(&initiated.upload_url)
                .header("Content-Type", mime)
                .body(bytes.to_vec())
                .send()
                .await;
            match uploaded {
                Ok(response) if response.status().is_success() => {
                    return Ok(initiated.file_url);
                }
                Ok(response) => warn!(
                    "fal storage upload failed with status {}; falling back to data URI",
                    response.status()
                ),
                Err(err) => warn!("fal storage upload failed: {err}; falling back to data URI"),
            }
        }

        Ok(format!(
            "data:{mime};base64,{}",
            general_purpose::STANDARD.encode(bytes)
        ))
    }

    async fn generate_scene(
        &self,
        prompt: &str,
        image_url: &str,
    ) -> Result<SceneImage, ProviderError> {
        let payload = json!({
            "prompt": prompt,
            "image_url": image_url,
            "guidance_scale": 3.5,
            "output_format": "jpeg",
            "num_images": 1,
            "safety_tolerance": "2",
            "aspect_ratio": "1:1",
        });

        let model = self.scene_model.clone();
        let budget = self.scene_timeout;
        let (_, body) = log_provider_timing(
            "fal",
            &model,
            "generate_scene",
            Some(json!({ "prompt_chars": prompt.chars().count() })),
            || self.run_model(&model, payload, budget),
        )
        .await?;

        let result: FalKontextResult = serde_json::from_str(&body)
            .map_err(|err| ProviderError::Upstream(format!("unparseable fal response: {err}")))?;

        if result
            .has_nsfw_concepts
            .as_ref()
            .and_then(|flags| flags.first())
            .copied()
            .unwrap_or(false)
        {
            warn!("fal flagged the generated image as NSFW");
            return Err(ProviderError::SafetyFiltered);
        }

        let url = result
            .images
            .and_then(|images| images.into_iter().next())
            .map(|image| image.url)
            .ok_or(ProviderError::NoImage)?;

        Ok(SceneImage {
            url,
            request_id: result.request_id,
        })
    }

    async fn swap_face(
        &self,
        target_url: &str,
        selfie_url: &str,
    ) -> Result<String, ProviderError> {
        let payload = json!({
            "base_image_url": target_url,
            "swap_image_url": selfie_url,
        });

        let model = self.face_swap_model.clone();
        let budget = self.swap_timeout;
        let (_, body) = log_provider_timing(
            "fal",
            &model,
            "swap_face",
            None,
            || self.run_model(&model, payload, budget),
        )
        .await?;

        let result: FalFaceSwapResult = serde_json::from_str(&body)
            .map_err(|err| ProviderError::Upstream(format!("unparseable fal response: {err}")))?;

        result
            .image
            .map(|image| image.url)
            .or_else(|| {
                result
                    .images
                    .and_then(|images| images.into_iter().next())
                    .map(|image| image.url)
            })
            .ok_or(ProviderError::NoImage)
    }
}
