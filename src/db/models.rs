use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lifecycle of a generation row. Monotonic: a row starts at `Processing`
/// and moves to `Completed` or `Failed` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl GenerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStatus::Pending => "pending",
            GenerationStatus::Processing => "processing",
            GenerationStatus::Completed => "completed",
            GenerationStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct GenerationRow {
    pub id: String,
    pub user_id: Option<String>,
    pub input_image_path: Option<String>,
    pub scene_type: String,
    pub player_style: String,
    pub prompt_used: String,
    pub status: String,
    pub output_image_path: Option<String>,
    pub processing_time_ms: Option<i64>,
    pub is_free: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct GenerationInsert {
    pub id: String,
    pub user_id: Option<String>,
    pub input_image_path: Option<String>,
    pub scene_type: String,
    pub player_style: String,
    pub prompt_used: String,
    pub is_free: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct UserCredits {
    pub free_credits: i64,
    pub paid_credits: i64,
}
