use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::info;

/// Wall-clock accounting for one API request, mirrored into the timing log
/// under the `api.timing` target.
#[derive(Debug)]
pub struct RequestTimer {
    route: String,
    user_id: Option<String>,
    started_at: DateTime<Utc>,
    started_perf: Instant,
    status: String,
    detail: Option<String>,
    completed: bool,
}

impl RequestTimer {
    pub fn start(route: &str, user_id: Option<&str>) -> Self {
        let timer = RequestTimer {
            route: route.to_string(),
            user_id: user_id.map(|value| value.to_string()),
            started_at: Utc::now(),
            started_perf: Instant::now(),
            status: "success".to_string(),
            detail: None,
            completed: false,
        };
        info!(
            target: "api.timing",
            "event=request_received route={} user_id={:?} received_at={}",
            timer.route,
            timer.user_id,
            timer.started_at.to_rfc3339()
        );
        timer
    }

    pub fn set_user(&mut self, user_id: Option<&str>) {
        self.user_id = user_id.map(|value| value.to_string());
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_perf.elapsed().as_millis() as u64
    }

    pub fn mark_status(&mut self, status: &str, detail: Option<String>) {
        self.status = status.to_string();
        self.detail = detail;
    }

    pub fn log_completed(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        let completed_at = Utc::now();
        let duration = self.started_perf.elapsed().as_secs_f64();
        info!(
            target: "api.timing",
            "event=request_completed route={} user_id={:?} started_at={} response_sent_at={} duration_s={:.3} status={} detail={}",
            self.route,
            self.user_id,
            self.started_at.to_rfc3339(),
            completed_at.to_rfc3339(),
            duration,
            self.status,
            self.detail.clone().unwrap_or_default()
        );
    }
}

/// Wraps one external provider call with request/response timing lines.
pub async fn log_provider_timing<T, E, F, Fut>(
    provider: &str,
    model: &str,
    operation: &str,
    metadata: Option<JsonValue>,
    call: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let started_at = Utc::now();
    let started_perf = Instant::now();
    let metadata_text = metadata
        .as_ref()
        .map(|value| value.to_string())
        .unwrap_or_else(|| "{}".to_string());
    info!(
        target: "api.timing",
        "event=provider_request provider={} model={} operation={} started_at={} metadata={}",
        provider,
        model,
        operation,
        started_at.to_rfc3339(),
        metadata_text
    );

    let result = call().await;
    let status = if result.is_err() { "error" } else { "success" };

    let completed_at = Utc::now();
    let duration = started_perf.elapsed().as_secs_f64();
    info!(
        target: "api.timing",
        "event=provider_response provider={} model={} operation={} completed_at={} duration_s={:.3} status={} metadata={}",
        provider,
        model,
        operation,
        completed_at.to_rfc3339(),
        duration,
        status,
        metadata_text
    );

    result
}
