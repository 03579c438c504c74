use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{resolve_user, AuthenticatedUser};
use crate::db::models::GenerationInsert;
use crate::errors::ApiError;
use crate::prompt::{build_prompt, PlayerPromptData, PromptStage};
use crate::state::AppState;
use crate::storage::parse_data_uri;
use crate::utils::timing::RequestTimer;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub selfie_base64: String,
    #[serde(default)]
    pub scene: String,
    #[serde(default)]
    pub player_name: String,
    #[serde(default)]
    pub player_country: Option<String>,
    #[serde(default)]
    pub player_number: Option<i64>,
    #[serde(default)]
    pub team_colors: Option<[String; 2]>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub image_url: String,
    pub generation_id: Option<String>,
    pub prompt: String,
    pub processing_time_ms: u64,
    pub mock: bool,
}

pub async fn generate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let mut timer = RequestTimer::start("/api/generate", None);
    let user = resolve_user(&state.config, &headers).await;
    timer.set_user(user.as_ref().map(|u| u.id.as_str()));

    let result = run_generation(&state, user, request, &timer).await;
    match &result {
        Ok(_) => timer.mark_status("success", None),
        Err(err) => timer.mark_status("error", Some(err.to_string())),
    }
    timer.log_completed();
    result.map(Json)
}

fn validate(request: &GenerateRequest, max_selfie_bytes: usize) -> Result<(), ApiError> {
    if request.selfie_base64.trim().is_empty()
        || request.scene.trim().is_empty()
        || request.player_name.trim().is_empty()
    {
        return Err(ApiError::MissingFields);
    }
    if request.selfie_base64.len() > max_selfie_bytes {
        return Err(ApiError::PayloadTooLarge);
    }
    Ok(())
}

fn normalize_data_uri(selfie_base64: &str) -> String {
    if selfie_base64.starts_with("data:") {
        selfie_base64.to_string()
    } else {
        format!("data:image/jpeg;base64,{selfie_base64}")
    }
}

/// The generation pipeline: validate, persist-start, stage 1 (scene),
/// stage 2 (face-swap, best-effort), persist-result. Stage-1 failures
/// surface to the caller; everything downstream of a successful stage 1
/// degrades instead of failing the request.
pub async fn run_generation(
    state: &AppState,
    user: Option<AuthenticatedUser>,
    request: GenerateRequest,
    timer: &RequestTimer,
) -> Result<GenerateResponse, ApiError> {
    validate(&request, state.config.max_selfie_bytes)?;

    let player = PlayerPromptData {
        name: request.player_name.clone(),
        country: request
            .player_country
            .clone()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| "International".to_string()),
        number: request.player_number.unwrap_or(10),
        team_colors: request
            .team_colors
            .clone()
            .unwrap_or_else(|| ["#FFFFFF".to_string(), "#000000".to_string()]),
    };

    let scene_prompt = build_prompt(&request.scene, &player, PromptStage::SceneOnly)?;
    let selfie_data_uri = normalize_data_uri(&request.selfie_base64);

    // Persist-start: bookkeeping is secondary to the AI call. Insert
    // failures log and the pipeline keeps going, unrecorded.
    let generation_id = user.as_ref().map(|_| Uuid::new_v4().to_string());
    let owner = user.as_ref().map(|u| u.id.clone());
    let mut input_image_path = None;

    if let (Some(user), Some(generation_id)) = (user.as_ref(), generation_id.as_ref()) {
        if let Err(err) = state.db.ensure_user(&user.id, user.email.as_deref()).await {
            warn!("Failed to ensure user row for {}: {err}", user.id);
        }

        input_image_path = state
            .storage
            .upload_selfie(&user.id, &selfie_data_uri)
            .await;

        let is_free = match state.db.get_user_credits(&user.id).await {
            Ok(Some(credits)) => credits.free_credits > 0,
            _ => false,
        };

        let insert = GenerationInsert {
            id: generation_id.clone(),
            user_id: Some(user.id.clone()),
            input_image_path: input_image_path.clone(),
            scene_type: request.scene.clone(),
            player_style: request.player_name.clone(),
            prompt_used: scene_prompt.clone(),
            is_free,
        };
        if let Err(err) = state.db.insert_generation(insert).await {
            warn!("Failed to record generation {generation_id}: {err}");
        }
    }

    // Stage 1 input: a short-lived signed URL from our own storage when we
    // have one, the provider's storage next, the raw data URI last.
    let selfie_remote_url = match &input_image_path {
        Some(path) => state.storage.selfie_signed_url(path).await,
        None => None,
    };
    let selfie_remote_url = match selfie_remote_url {
        Some(url) => url,
        None => match parse_data_uri(&selfie_data_uri) {
            Some((mime, bytes)) => state
                .provider
                .upload_image(&bytes, &mime)
                .await
                .unwrap_or_else(|err| {
                    warn!("Provider upload failed, passing data URI inline: {err}");
                    selfie_data_uri.clone()
                }),
            None => selfie_data_uri.clone(),
        },
    };

    let scene_image = match state
        .provider
        .generate_scene(&scene_prompt, &selfie_remote_url)
        .await
    {
        Ok(image) => image,
        Err(err) => {
            if let Some(generation_id) = generation_id.as_ref() {
                if let Err(db_err) = state
                    .db
                    .mark_generation_failed(generation_id, timer.elapsed_ms() as i64)
                    .await
                {
                    warn!("Failed to mark generation {generation_id} failed: {db_err}");
                }
            }
            return Err(ApiError::Provider(err));
        }
    };

    // Stage 2 is best-effort: a face-swap failure downgrades to the stage-1
    // image rather than failing the whole request.
    let final_url = match state
        .provider
        .swap_face(&scene_image.url, &selfie_remote_url)
        .await
    {
        Ok(url) => url,
        Err(err) => {
            warn!("Face-swap failed, falling back to scene image: {err}");
            scene_image.url.clone()
        }
    };

    // Persist-result: copy the image into our own storage and settle the
    // books. None of this changes the response on failure.
    let mut response_url = final_url.clone();
    if let (Some(owner), Some(generation_id)) = (owner.as_ref(), generation_id.as_ref()) {
        let stored_path = state
            .storage
            .upload_generated(owner, generation_id, &final_url)
            .await;
        if let Some(path) = &stored_path {
            if let Some(public_url) = state.storage.generated_public_url(path) {
                response_url = public_url;
            }
        }

        let elapsed_ms = timer.elapsed_ms() as i64;
        if let Err(err) = state
            .db
            .mark_generation_completed(generation_id, stored_path.as_deref(), elapsed_ms)
            .await
        {
            warn!("Failed to mark generation {generation_id} completed: {err}");
        }

        match state.db.spend_credit(owner).await {
            Ok(Some(used_free)) => {
                info!("Spent one {} credit for {owner}", if used_free { "free" } else { "paid" });
            }
            Ok(None) => warn!("No credits left to spend for {owner}"),
            Err(err) => warn!("Credit spend failed for {owner}: {err}"),
        }
    }

    Ok(GenerateResponse {
        image_url: response_url,
        generation_id,
        prompt: scene_prompt,
        processing_time_ms: timer.elapsed_ms(),
        mock: state.provider.is_mock(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::http::StatusCode;

    use super::*;
    use crate::config::Config;
    use crate::db::database::Database;
    use crate::providers::{ImageProvider, ProviderError, SceneImage};

    fn test_config() -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            log_level: "off".to_string(),
            database_url: "sqlite::memory:".to_string(),
            fal_api_key: String::new(),
            fal_scene_model: "fal-ai/flux-pro/kontext".to_string(),
            fal_face_swap_model: "fal-ai/face-swap".to_string(),
            scene_timeout_secs: 110,
            face_swap_timeout_secs: 60,
            mock_delay_ms: 0,
            max_selfie_bytes: 4 * 1024 * 1024,
            supabase_url: String::new(),
            supabase_service_role_key: String::new(),
            stripe_secret_key: String::new(),
            stripe_webhook_secret: String::new(),
            checkout_origin: "http://localhost:3000".to_string(),
        }
    }

    async fn test_state() -> AppState {
        let config = test_config();
        let db = Database::init(&config.database_url).await.unwrap();
        AppState::new(config, db)
    }

    fn valid_request() -> GenerateRequest {
        GenerateRequest {
            selfie_base64: "data:image/jpeg;base64,aGVsbG8=".to_string(),
            scene: "vip_tunnel".to_string(),
            player_name: "Lionel Messi".to_string(),
            player_country: Some("Argentina".to_string()),
            player_number: Some(10),
            team_colors: Some(["#75AADB".to_string(), "#FFFFFF".to_string()]),
        }
    }

    fn test_user() -> AuthenticatedUser {
        AuthenticatedUser {
            id: "user-1".to_string(),
            email: Some("fan@example.com".to_string()),
        }
    }

    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ImageProvider for CountingProvider {
        async fn upload_image(&self, _: &[u8], _: &str) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("http://example.com/selfie".to_string())
        }

        async fn generate_scene(&self, _: &str, _: &str) -> Result<SceneImage, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SceneImage {
                url: "http://example.com/scene.jpeg".to_string(),
                request_id: None,
            })
        }

        async fn swap_face(&self, _: &str, _: &str) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("http://example.com/swapped.jpeg".to_string())
        }
    }

    struct FailingSwapProvider;

    #[async_trait]
    impl ImageProvider for FailingSwapProvider {
        async fn upload_image(&self, _: &[u8], _: &str) -> Result<String, ProviderError> {
            Ok("http://example.com/selfie".to_string())
        }

        async fn generate_scene(&self, _: &str, _: &str) -> Result<SceneImage, ProviderError> {
            Ok(SceneImage {
                url: "http://example.com/scene.jpeg".to_string(),
                request_id: None,
            })
        }

        async fn swap_face(&self, _: &str, _: &str) -> Result<String, ProviderError> {
            Err(ProviderError::Timeout(60))
        }
    }

    struct FailingSceneProvider;

    #[async_trait]
    impl ImageProvider for FailingSceneProvider {
        async fn upload_image(&self, _: &[u8], _: &str) -> Result<String, ProviderError> {
            Ok("http://example.com/selfie".to_string())
        }

        async fn generate_scene(&self, _: &str, _: &str) -> Result<SceneImage, ProviderError> {
            Err(ProviderError::RateLimited)
        }

        async fn swap_face(&self, _: &str, _: &str) -> Result<String, ProviderError> {
            unreachable!("stage 2 must not run after a stage-1 failure")
        }
    }

    #[tokio::test]
    async fn mock_mode_end_to_end_returns_the_placeholder() {
        let state = test_state().await;
        let timer = RequestTimer::start("/api/generate", None);
        let response = run_generation(&state, None, valid_request(), &timer)
            .await
            .unwrap();

        assert!(response.mock);
        assert!(response.image_url.starts_with("https://fal.media/"));
        assert!(response.generation_id.is_none());
        assert!(response.prompt.contains("Argentina"));
    }

    #[tokio::test]
    async fn authenticated_request_persists_a_completed_row_and_spends_a_credit() {
        let state = test_state().await;
        let timer = RequestTimer::start("/api/generate", None);
        let response = run_generation(&state, Some(test_user()), valid_request(), &timer)
            .await
            .unwrap();

        let generation_id = response.generation_id.expect("row id for signed-in user");
        let row = state.db.get_generation(&generation_id).await.unwrap().unwrap();
        assert_eq!(row.status, "completed");
        assert_eq!(row.user_id.as_deref(), Some("user-1"));
        assert_eq!(row.scene_type, "vip_tunnel");
        assert!(row.prompt_used.chars().count() <= 2000);

        let credits = state.db.get_user_credits("user-1").await.unwrap().unwrap();
        assert_eq!(credits.free_credits, 2);
    }

    #[tokio::test]
    async fn face_swap_failure_falls_back_to_the_scene_image() {
        let state = test_state().await.with_provider(Arc::new(FailingSwapProvider));
        let timer = RequestTimer::start("/api/generate", None);
        let response = run_generation(&state, Some(test_user()), valid_request(), &timer)
            .await
            .unwrap();

        assert_eq!(response.image_url, "http://example.com/scene.jpeg");
        let generation_id = response.generation_id.unwrap();
        let row = state.db.get_generation(&generation_id).await.unwrap().unwrap();
        assert_eq!(row.status, "completed");
    }

    #[tokio::test]
    async fn scene_failure_surfaces_and_marks_the_row_failed() {
        let state = test_state().await.with_provider(Arc::new(FailingSceneProvider));
        let timer = RequestTimer::start("/api/generate", None);
        let err = run_generation(&state, Some(test_user()), valid_request(), &timer)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn oversized_payload_is_rejected_before_any_provider_call() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let state = test_state().await.with_provider(provider.clone());

        let mut request = valid_request();
        request.selfie_base64 = "A".repeat(5 * 1024 * 1024);
        let timer = RequestTimer::start("/api/generate", None);
        let err = run_generation(&state, None, request, &timer)
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_fields_are_rejected() {
        let state = test_state().await;
        let mut request = valid_request();
        request.player_name = String::new();
        let timer = RequestTimer::start("/api/generate", None);
        let err = run_generation(&state, None, request, &timer)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_scene_is_a_bad_request() {
        let state = test_state().await;
        let mut request = valid_request();
        request.scene = "moon_landing".to_string();
        let timer = RequestTimer::start("/api/generate", None);
        let err = run_generation(&state, None, request, &timer)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
