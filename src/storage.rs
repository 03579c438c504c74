use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};

use crate::config::Config;
use crate::utils::http::get_http_client;
use crate::utils::media::{detect_mime_type, download_image};

const SELFIE_BUCKET: &str = "selfies";
const GENERATED_BUCKET: &str = "generated";
const SIGNED_URL_EXPIRY_SECS: u32 = 3600;

static DATA_URI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:(image/\w+);base64,(.+)$").expect("valid data uri regex")
});

/// Server-side bridge to the app's own object storage. Every operation is
/// best-effort: a failure degrades the caller to a fallback path (signed
/// URL, or the original external URL) instead of aborting the request.
#[derive(Clone)]
pub struct StorageBridge {
    base_url: String,
    service_role_key: String,
    configured: bool,
}

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

/// Splits a `data:image/...;base64,` URI into content type and raw bytes.
pub fn parse_data_uri(data_uri: &str) -> Option<(String, Vec<u8>)> {
    use base64::{engine::general_purpose, Engine as _};

    let captures = DATA_URI_RE.captures(data_uri)?;
    let content_type = captures.get(1)?.as_str().to_string();
    let bytes = general_purpose::STANDARD
        .decode(captures.get(2)?.as_str())
        .ok()?;
    Some((content_type, bytes))
}

impl StorageBridge {
    pub fn new(config: &Config) -> Self {
        StorageBridge {
            base_url: config.supabase_url.clone(),
            service_role_key: config.supabase_service_role_key.clone(),
            configured: config.is_storage_configured(),
        }
    }

    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Option<()> {
        let client = get_http_client();
        let url = format!("{}/storage/v1/object/{bucket}/{path}", self.base_url);
        let response = client
            .post(&url)
            .bearer_auth(&self.service_role_key)
            .header("apikey", &self.service_role_key)
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => Some(()),
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                error!("Storage upload to {bucket}/{path} failed: {status} {body}");
                None
            }
            Err(err) => {
                error!("Storage upload to {bucket}/{path} failed: {err}");
                None
            }
        }
    }

    /// Stores a selfie (private bucket) from a base64 data URI. Returns the
    /// storage path, or None when unconfigured or on any failure.
    pub async fn upload_selfie(&self, user_id: &str, data_uri: &str) -> Option<String> {
        if !self.configured {
            return None;
        }

        let (content_type, bytes) = parse_data_uri(data_uri)?;
        let ext = content_type.split('/').nth(1).unwrap_or("jpeg");
        let path = format!("{user_id}/{}.{ext}", Utc::now().timestamp_millis());

        self.upload_object(SELFIE_BUCKET, &path, &content_type, bytes)
            .await?;
        Some(path)
    }

    /// One-hour signed URL for a private selfie.
    pub async fn selfie_signed_url(&self, path: &str) -> Option<String> {
        if !self.configured {
            return None;
        }

        let client = get_http_client();
        let url = format!(
            "{}/storage/v1/object/sign/{SELFIE_BUCKET}/{path}",
            self.base_url
        );
        let response = client
            .post(&url)
            .bearer_auth(&self.service_role_key)
            .header("apikey", &self.service_role_key)
            .json(&json!({ "expiresIn": SIGNED_URL_EXPIRY_SECS }))
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                let signed: SignedUrlResponse = response.json().await.ok()?;
                Some(format!(
                    "{}/storage/v1{}",
                    self.base_url,
                    signed.signed_url
                ))
            }
            Ok(response) => {
                error!("Signed URL request failed: {}", response.status());
                None
            }
            Err(err) => {
                error!("Signed URL request failed: {err}");
                None
            }
        }
    }

    /// Copies a generated image from the provider's temporary URL into the
    /// public bucket so the external URL is not a durability dependency.
    pub async fn upload_generated(
        &self,
        user_id: &str,
        generation_id: &str,
        source_url: &str,
    ) -> Option<String> {
        if !self.configured {
            return None;
        }

        let (bytes, content_type) = download_image(source_url).await?;
        let content_type = content_type
            .or_else(|| detect_mime_type(&bytes))
            .unwrap_or_else(|| "image/jpeg".to_string());
        let ext = content_type
            .split('/')
            .nth(1)
            .and_then(|value| value.split(';').next())
            .unwrap_or("jpeg");
        let path = format!("{user_id}/{generation_id}.{ext}");

        self.upload_object(GENERATED_BUCKET, &path, &content_type, bytes)
            .await?;
        Some(path)
    }

    pub fn generated_public_url(&self, path: &str) -> Option<String> {
        if !self.configured {
            return None;
        }
        Some(format!(
            "{}/storage/v1/object/public/{GENERATED_BUCKET}/{path}",
            self.base_url
        ))
    }

    /// Removes a stored selfie when its gallery entry goes away. Best-effort
    /// like everything else here; failures only warn.
    pub async fn delete_selfie(&self, path: &str) -> bool {
        if !self.configured {
            return false;
        }

        let client = get_http_client();
        let url = format!(
            "{}/storage/v1/object/{SELFIE_BUCKET}/{path}",
            self.base_url
        );
        match client
            .delete(&url)
            .bearer_auth(&self.service_role_key)
            .header("apikey", &self.service_role_key)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!("Delete selfie {path} failed: {}", response.status());
                false
            }
            Err(err) => {
                warn!("Delete selfie {path} failed: {err}");
                false
            }
        }
    }
}
