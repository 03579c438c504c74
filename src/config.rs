use std::env;

use anyhow::Result;
use tracing::info;

/// Runtime configuration, loaded once at startup and passed into the
/// application state. Missing provider keys switch the matching subsystem
/// into mock/offline mode instead of failing startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: String,
    pub fal_api_key: String,
    pub fal_scene_model: String,
    pub fal_face_swap_model: String,
    pub scene_timeout_secs: u64,
    pub face_swap_timeout_secs: u64,
    pub mock_delay_ms: u64,
    pub max_selfie_bytes: usize,
    pub supabase_url: String,
    pub supabase_service_role_key: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub checkout_origin: String,
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u16(name: &str, default: u16) -> u16 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

fn normalize_database_url(value: String) -> String {
    if value.starts_with("sqlite+aiosqlite://") {
        return value.replacen("sqlite+aiosqlite://", "sqlite://", 1);
    }
    value
}

impl Config {
    pub fn load() -> Result<Self> {
        let config = Config {
            host: env_string("HOST", "0.0.0.0"),
            port: env_u16("PORT", 8080),
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            database_url: normalize_database_url(env_string(
                "DATABASE_URL",
                "sqlite://fanshot.db?mode=rwc",
            )),
            fal_api_key: env_string("FAL_API_KEY", ""),
            fal_scene_model: env_string("FAL_SCENE_MODEL", "fal-ai/flux-pro/kontext"),
            fal_face_swap_model: env_string("FAL_FACE_SWAP_MODEL", "fal-ai/face-swap"),
            scene_timeout_secs: env_u64("SCENE_TIMEOUT_SECS", 110),
            face_swap_timeout_secs: env_u64("FACE_SWAP_TIMEOUT_SECS", 60),
            mock_delay_ms: env_u64("MOCK_DELAY_MS", 2_500),
            max_selfie_bytes: env_usize("MAX_SELFIE_BYTES", 4 * 1024 * 1024),
            supabase_url: env_string("SUPABASE_URL", "")
                .trim_end_matches('/')
                .to_string(),
            supabase_service_role_key: env_string("SUPABASE_SERVICE_ROLE_KEY", ""),
            stripe_secret_key: env_string("STRIPE_SECRET_KEY", ""),
            stripe_webhook_secret: env_string("STRIPE_WEBHOOK_SECRET", ""),
            checkout_origin: env_string("CHECKOUT_ORIGIN", "http://localhost:3000"),
        };

        Ok(config)
    }

    /// Called after the tracing subscriber is installed so the mode notices
    /// actually land in the logs.
    pub fn log_startup_modes(&self) {
        if !self.is_provider_configured() {
            info!("FAL_API_KEY not set; image generation runs in mock mode");
        }
        if !self.is_storage_configured() {
            info!("Supabase storage not configured; generated images keep provider URLs");
        }
        if !self.is_stripe_configured() {
            info!("STRIPE_SECRET_KEY not set; checkout runs in mock mode");
        }
    }

    pub fn is_provider_configured(&self) -> bool {
        !self.fal_api_key.trim().is_empty()
    }

    pub fn is_storage_configured(&self) -> bool {
        !self.supabase_url.trim().is_empty() && !self.supabase_service_role_key.trim().is_empty()
    }

    pub fn is_stripe_configured(&self) -> bool {
        !self.stripe_secret_key.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_python_style_sqlite_urls() {
        let normalized = normalize_database_url("sqlite+aiosqlite:///fanshot.db".to_string());
        assert_eq!(normalized, "sqlite:///fanshot.db");
    }

    #[test]
    fn leaves_plain_sqlite_urls_untouched() {
        let url = "sqlite://fanshot.db?mode=rwc".to_string();
        assert_eq!(normalize_database_url(url.clone()), url);
    }
}
