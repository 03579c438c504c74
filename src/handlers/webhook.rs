use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::{info, warn};

use crate::errors::ApiError;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// How far a webhook timestamp may drift before we reject it as a replay.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Deserialize)]
struct StripeEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: CheckoutSession,
}

#[derive(Debug, Deserialize)]
struct CheckoutSession {
    id: String,
    #[serde(default)]
    metadata: SessionMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct SessionMetadata {
    #[serde(rename = "userId")]
    user_id: Option<String>,
    #[serde(rename = "packageName")]
    package_name: Option<String>,
    credits: Option<String>,
}

/// Parses a `Stripe-Signature` header of the form `t=<unix>,v1=<hex>[,v1=..]`.
fn parse_signature_header(header: &str) -> Option<(i64, Vec<String>)> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let (key, value) = part.trim().split_once('=')?;
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            "v1" => signatures.push(value.to_string()),
            _ => {}
        }
    }
    match (timestamp, signatures.is_empty()) {
        (Some(t), false) => Some((t, signatures)),
        _ => None,
    }
}

/// Verifies the Stripe webhook signature scheme: HMAC-SHA256 over
/// `"{timestamp}.{body}"` with the endpoint secret, hex-encoded, compared
/// in constant time via the Mac verify path.
fn verify_signature(secret: &str, header: &str, body: &str, now_unix: i64) -> bool {
    let Some((timestamp, signatures)) = parse_signature_header(header) else {
        return false;
    };
    if (now_unix - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return false;
    }

    let signed_payload = format!("{timestamp}.{body}");
    for candidate in &signatures {
        let Ok(expected) = hex::decode(candidate) else {
            continue;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(signed_payload.as_bytes());
        if mac.verify_slice(&expected).is_ok() {
            return true;
        }
    }
    false
}

pub async fn stripe_webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, ApiError> {
    if !state.config.is_stripe_configured() {
        info!("Stripe not configured; acknowledging webhook without processing");
        return Ok(Json(json!({ "received": true })));
    }

    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing Stripe-Signature header".to_string()))?;

    let now_unix = chrono::Utc::now().timestamp();
    if !verify_signature(
        &state.config.stripe_webhook_secret,
        signature,
        &body,
        now_unix,
    ) {
        warn!("Rejected webhook with invalid signature");
        return Err(ApiError::BadRequest(
            "Invalid webhook signature".to_string(),
        ));
    }

    let event: StripeEvent = serde_json::from_str(&body)
        .map_err(|err| ApiError::BadRequest(format!("Malformed event payload: {err}")))?;

    if event.event_type == "checkout.session.completed" {
        credit_purchase(&state, &event.data.object).await;
    } else {
        info!("Ignoring webhook event type {}", event.event_type);
    }

    Ok(Json(json!({ "received": true })))
}

/// Applies a completed checkout to the buyer's balance. Failures only log;
/// Stripe retries delivery on non-2xx, and we have already verified the
/// event is authentic.
async fn credit_purchase(state: &AppState, session: &CheckoutSession) {
    let Some(user_id) = session.metadata.user_id.as_deref() else {
        warn!("Checkout session {} has no userId metadata", session.id);
        return;
    };
    let credits = session
        .metadata
        .credits
        .as_deref()
        .and_then(|value| value.parse::<i64>().ok());
    let Some(credits) = credits.filter(|value| *value > 0) else {
        warn!("Checkout session {} has no usable credits metadata", session.id);
        return;
    };
    let package_name = session.metadata.package_name.as_deref();

    if let Err(err) = state.db.ensure_user(user_id, None).await {
        warn!("Failed to ensure user {user_id} for purchase: {err}");
    }
    match state
        .db
        .add_credits(user_id, credits, "purchase", package_name, Some(&session.id))
        .await
    {
        Ok(()) => info!(
            "Credited {credits} paid credits to {user_id} from session {}",
            session.id
        ),
        Err(err) => warn!(
            "Failed to credit purchase from session {}: {err}",
            session.id
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, timestamp: i64, body: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.{body}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn accepts_a_correctly_signed_payload() {
        let secret = "whsec_test";
        let body = r#"{"type":"checkout.session.completed"}"#;
        let now = 1_700_000_000;
        let header = format!("t={now},v1={}", sign(secret, now, body));
        assert!(verify_signature(secret, &header, body, now));
    }

    #[test]
    fn rejects_a_wrong_secret_or_tampered_body() {
        let body = r#"{"type":"checkout.session.completed"}"#;
        let now = 1_700_000_000;
        let header = format!("t={now},v1={}", sign("whsec_test", now, body));
        assert!(!verify_signature("whsec_other", &header, body, now));
        assert!(!verify_signature("whsec_test", &header, "tampered", now));
    }

    #[test]
    fn rejects_stale_timestamps() {
        let secret = "whsec_test";
        let body = "{}";
        let then = 1_700_000_000;
        let header = format!("t={then},v1={}", sign(secret, then, body));
        assert!(!verify_signature(secret, &header, body, then + 301));
        assert!(verify_signature(secret, &header, body, then + 299));
    }

    #[test]
    fn rejects_malformed_headers() {
        assert!(!verify_signature("s", "", "{}", 0));
        assert!(!verify_signature("s", "t=notanumber,v1=00", "{}", 0));
        assert!(!verify_signature("s", "v1=00", "{}", 0));
        assert!(!verify_signature("s", "t=100", "{}", 100));
    }

    #[test]
    fn accepts_any_matching_v1_among_several() {
        let secret = "whsec_test";
        let body = "{}";
        let now = 1_700_000_000;
        let good = sign(secret, now, body);
        let header = format!("t={now},v1=deadbeef,v1={good}");
        assert!(verify_signature(secret, &header, body, now));
    }

    #[test]
    fn parses_session_metadata() {
        let body = r#"{
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_test_123",
                "metadata": { "userId": "user-1", "packageName": "starter", "credits": "5" }
            }}
        }"#;
        let event: StripeEvent = serde_json::from_str(body).unwrap();
        assert_eq!(event.event_type, "checkout.session.completed");
        assert_eq!(event.data.object.metadata.user_id.as_deref(), Some("user-1"));
        assert_eq!(event.data.object.metadata.credits.as_deref(), Some("5"));
    }
}
