use std::time::Duration;

use reqwest::StatusCode;
use tracing::warn;

use crate::utils::http::get_http_client;

/// Sniffs a MIME type from magic bytes. HEIC needs a manual check because
/// `infer` reports the container, not the brand.
pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

const DOWNLOAD_MAX_ATTEMPTS: usize = 3;
const DOWNLOAD_BASE_DELAY_MS: u64 = 400;
const DOWNLOAD_ERROR_BODY_LIMIT: usize = 800;

pub fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn should_retry_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

fn should_retry_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

/// Downloads image bytes with bounded retries, returning the body and the
/// content type the server reported (if any). `None` on exhaustion; callers
/// treat that as a degraded path, not a hard failure.
pub async fn download_image(url: &str) -> Option<(Vec<u8>, Option<String>)> {
    let client = get_http_client();
    for attempt in 0..DOWNLOAD_MAX_ATTEMPTS {
        let response = match client.get(url).send().await {
            Ok(resp) => resp,
            Err(err) => {
                warn!(
                    "Failed to fetch image {url}: {err} (timeout={}, connect={}, attempt={}/{})",
                    err.is_timeout(),
                    err.is_connect(),
                    attempt + 1,
                    DOWNLOAD_MAX_ATTEMPTS
                );
                if !should_retry_error(&err) || attempt + 1 == DOWNLOAD_MAX_ATTEMPTS {
                    return None;
                }
                let delay = Duration::from_millis(DOWNLOAD_BASE_DELAY_MS << attempt);
                tokio::time::sleep(delay).await;
                continue;
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(
                "Image download failed for {url} with status {}: {}",
                status,
                truncate_for_log(&body, DOWNLOAD_ERROR_BODY_LIMIT)
            );
            if !should_retry_status(status) || attempt + 1 == DOWNLOAD_MAX_ATTEMPTS {
                return None;
            }
            let delay = Duration::from_millis(DOWNLOAD_BASE_DELAY_MS << attempt);
            tokio::time::sleep(delay).await;
            continue;
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        match response.bytes().await {
            Ok(bytes) => return Some((bytes.to_vec(), content_type)),
            Err(err) => {
                warn!("Failed to read image body from {url}: {err}");
                if attempt + 1 == DOWNLOAD_MAX_ATTEMPTS {
                    return None;
                }
                let delay = Duration::from_millis(DOWNLOAD_BASE_DELAY_MS << attempt);
                tokio::time::sleep(delay).await;
            }
        }
    }

    None
}
