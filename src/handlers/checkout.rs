use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::resolve_user;
use crate::errors::ApiError;
use crate::state::AppState;
use crate::utils::http::get_http_client;

const STRIPE_CHECKOUT_SESSIONS_URL: &str = "https://api.stripe.com/v1/checkout/sessions";

/// A purchasable credit bundle. Prices are integer cents, the way Stripe
/// wants them.
#[derive(Debug, Clone, Copy)]
pub struct CreditPackage {
    pub id: &'static str,
    pub label: &'static str,
    pub credits: i64,
    pub price_cents: i64,
}

pub const CREDIT_PACKAGES: [CreditPackage; 3] = [
    CreditPackage {
        id: "starter",
        label: "Starter Pack",
        credits: 5,
        price_cents: 299,
    },
    CreditPackage {
        id: "fan_pack",
        label: "Fan Pack",
        credits: 15,
        price_cents: 699,
    },
    CreditPackage {
        id: "super_fan",
        label: "Super Fan Pack",
        credits: 50,
        price_cents: 1499,
    },
];

pub fn find_package(id: &str) -> Option<&'static CreditPackage> {
    CREDIT_PACKAGES.iter().find(|package| package.id == id)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub package_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub url: String,
    pub mock: bool,
}

#[derive(Debug, Deserialize)]
struct StripeSession {
    url: String,
}

pub async fn checkout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let package = find_package(&request.package_name)
        .ok_or_else(|| {
            ApiError::BadRequest(format!("Unknown package: {}", request.package_name))
        })?;

    let user = resolve_user(&state.config, &headers)
        .await
        .ok_or_else(|| ApiError::BadRequest("Sign in to purchase credits".to_string()))?;

    if !state.config.is_stripe_configured() {
        // Dev mode: skip Stripe and bounce straight to the success page.
        info!(
            "Mock checkout for {} ({} credits)",
            user.id, package.credits
        );
        return Ok(Json(CheckoutResponse {
            url: format!(
                "{}/credits/success?mock=true&package={}&credits={}",
                state.config.checkout_origin, package.id, package.credits
            ),
            mock: true,
        }));
    }

    let session = create_stripe_session(&state, &user.id, package).await?;
    Ok(Json(CheckoutResponse {
        url: session.url,
        mock: false,
    }))
}

async fn create_stripe_session(
    state: &AppState,
    user_id: &str,
    package: &CreditPackage,
) -> Result<StripeSession, ApiError> {
    let origin = &state.config.checkout_origin;
    let price_cents = package.price_cents.to_string();
    let credits = package.credits.to_string();
    let product_name = format!("{} ({} credits)", package.label, package.credits);
    let success_url = format!("{origin}/credits/success?session_id={{CHECKOUT_SESSION_ID}}");
    let cancel_url = format!("{origin}/credits");

    // Stripe's API takes form-encoded bodies with bracketed nested keys.
    let form: Vec<(&str, &str)> = vec![
        ("mode", "payment"),
        ("success_url", &success_url),
        ("cancel_url", &cancel_url),
        ("line_items[0][quantity]", "1"),
        ("line_items[0][price_data][currency]", "usd"),
        ("line_items[0][price_data][unit_amount]", &price_cents),
        ("line_items[0][price_data][product_data][name]", &product_name),
        ("metadata[userId]", user_id),
        ("metadata[packageName]", package.id),
        ("metadata[credits]", &credits),
    ];

    let client = get_http_client();
    let response = client
        .post(STRIPE_CHECKOUT_SESSIONS_URL)
        .basic_auth(&state.config.stripe_secret_key, None::<&str>)
        .form(&form)
        .send()
        .await
        .map_err(|err| {
            warn!("Stripe session request failed: {err}");
            ApiError::Internal
        })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        warn!("Stripe session rejected: {status} {body}");
        return Err(ApiError::Internal);
    }

    response.json::<StripeSession>().await.map_err(|err| {
        warn!("Failed to parse Stripe session response: {err}");
        ApiError::Internal
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_lookup_finds_the_known_bundles() {
        let starter = find_package("starter").unwrap();
        assert_eq!(starter.credits, 5);
        assert_eq!(starter.price_cents, 299);

        let super_fan = find_package("super_fan").unwrap();
        assert_eq!(super_fan.credits, 50);
        assert_eq!(super_fan.price_cents, 1499);

        assert!(find_package("mega_ultra").is_none());
        assert!(find_package("").is_none());
    }

    #[test]
    fn request_body_uses_the_package_name_field() {
        let request: CheckoutRequest =
            serde_json::from_str(r#"{"packageName":"fan_pack"}"#).unwrap();
        assert_eq!(request.package_name, "fan_pack");

        let empty: CheckoutRequest = serde_json::from_str("{}").unwrap();
        assert!(empty.package_name.is_empty());
    }

    #[test]
    fn packages_have_unique_ids_and_positive_prices() {
        for (i, a) in CREDIT_PACKAGES.iter().enumerate() {
            assert!(a.credits > 0);
            assert!(a.price_cents > 0);
            for b in &CREDIT_PACKAGES[i + 1..] {
                assert_ne!(a.id, b.id);
            }
        }
    }
}
