use axum::http::HeaderMap;
use serde::Deserialize;
use tracing::warn;

use crate::config::Config;
use crate::utils::http::get_http_client;

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SupabaseUser {
    id: String,
    email: Option<String>,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Resolves the caller's identity from a bearer token against the auth
/// backend. Returns None for anonymous/dev-mode requests: the pipeline still
/// runs, it just skips persistence and credit spend.
pub async fn resolve_user(config: &Config, headers: &HeaderMap) -> Option<AuthenticatedUser> {
    let token = bearer_token(headers)?;
    if !config.is_storage_configured() {
        // No auth backend configured; treat every caller as anonymous.
        return None;
    }

    let client = get_http_client();
    let url = format!("{}/auth/v1/user", config.supabase_url);
    let response = client
        .get(&url)
        .bearer_auth(token)
        .header("apikey", &config.supabase_service_role_key)
        .send()
        .await;

    match response {
        Ok(response) if response.status().is_success() => {
            match response.json::<SupabaseUser>().await {
                Ok(user) => Some(AuthenticatedUser {
                    id: user.id,
                    email: user.email,
                }),
                Err(err) => {
                    warn!("Failed to parse auth user response: {err}");
                    None
                }
            }
        }
        Ok(response) => {
            warn!("Auth lookup rejected with status {}", response.status());
            None
        }
        Err(err) => {
            warn!("Auth lookup failed: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::AUTHORIZATION;

    #[test]
    fn extracts_bearer_tokens() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer abc123".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc123"));
    }

    #[test]
    fn ignores_non_bearer_schemes_and_missing_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Basic dXNlcg==".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
