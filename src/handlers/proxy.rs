use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use serde::Deserialize;
use tracing::warn;
use url::Url;

use crate::errors::ApiError;
use crate::state::AppState;
use crate::utils::media::download_image;

const PROXY_CACHE_CONTROL: &str = "public, max-age=86400";

/// Only fetch over http(s); anything else is not an image URL we serve.
fn is_fetchable_url(value: &str) -> bool {
    match Url::parse(value) {
        Ok(parsed) => parsed.scheme() == "http" || parsed.scheme() == "https",
        Err(_) => false,
    }
}

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    url: Option<String>,
}

/// Fetches a remote image server-side so the browser can render and download
/// provider-hosted results without CORS trouble.
pub async fn proxy_image_handler(
    State(_state): State<AppState>,
    Query(query): Query<ProxyQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let url = query
        .url
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing url parameter".to_string()))?;

    if !is_fetchable_url(&url) {
        return Err(ApiError::BadRequest("Invalid url parameter".to_string()));
    }

    let Some((bytes, content_type)) = download_image(&url).await else {
        warn!("Proxy fetch failed for {url}");
        return Err(ApiError::Provider(
            crate::providers::ProviderError::Upstream("Failed to fetch image".to_string()),
        ));
    };

    let content_type = content_type.unwrap_or_else(|| "image/jpeg".to_string());
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("image/jpeg")),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(PROXY_CACHE_CONTROL),
    );

    Ok((StatusCode::OK, headers, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_and_https_urls_only() {
        assert!(is_fetchable_url("https://fal.media/files/x/image.webp"));
        assert!(is_fetchable_url("http://example.com/a.png"));
        assert!(!is_fetchable_url("ftp://example.com/a.png"));
        assert!(!is_fetchable_url("file:///etc/passwd"));
        assert!(!is_fetchable_url("data:image/png;base64,aGk="));
        assert!(!is_fetchable_url("not a url"));
    }
}
