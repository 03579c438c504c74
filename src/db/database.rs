use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::db::models::{GenerationInsert, GenerationRow, GenerationStatus, UserCredits};

const FREE_SIGNUP_CREDITS: i64 = 3;
const PROMPT_PERSIST_LIMIT: usize = 2000;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn init(database_url: &str) -> Result<Self> {
        // An in-memory SQLite database exists per connection; a larger pool
        // would hand out empty databases.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS generations (\
                id TEXT PRIMARY KEY,\
                user_id TEXT,\
                input_image_path TEXT,\
                scene_type TEXT NOT NULL,\
                player_style TEXT NOT NULL,\
                prompt_used TEXT NOT NULL,\
                status TEXT NOT NULL DEFAULT 'pending',\
                output_image_path TEXT,\
                processing_time_ms INTEGER,\
                is_free INTEGER NOT NULL DEFAULT 0,\
                created_at TEXT NOT NULL,\
                completed_at TEXT\
            );",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_generations_user_id ON generations(user_id);",
        )
        .execute(&pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_generations_created_at ON generations(created_at);",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (\
                id TEXT PRIMARY KEY,\
                email TEXT,\
                free_credits INTEGER NOT NULL DEFAULT 0,\
                paid_credits INTEGER NOT NULL DEFAULT 0,\
                created_at TEXT NOT NULL\
            );",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS credit_transactions (\
                id TEXT PRIMARY KEY,\
                user_id TEXT NOT NULL,\
                amount INTEGER NOT NULL,\
                type TEXT NOT NULL,\
                stripe_payment_id TEXT,\
                package_name TEXT,\
                created_at TEXT NOT NULL,\
                FOREIGN KEY(user_id) REFERENCES users(id)\
            );",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_credit_transactions_user_id ON credit_transactions(user_id);",
        )
        .execute(&pool)
        .await?;

        info!("Database tables created successfully");

        Ok(Database { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Creates the user row on first sight with the signup credit grant.
    pub async fn ensure_user(&self, user_id: &str, email: Option<&str>) -> Result<()> {
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO users (id, email, free_credits, paid_credits, created_at) \
             VALUES (?, ?, ?, 0, ?)",
        )
        .bind(user_id)
        .bind(email)
        .bind(FREE_SIGNUP_CREDITS)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() > 0 {
            sqlx::query(
                "INSERT INTO credit_transactions (id, user_id, amount, type, created_at) \
                 VALUES (?, ?, ?, 'free_signup', ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(user_id)
            .bind(FREE_SIGNUP_CREDITS)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    pub async fn insert_generation(&self, insert: GenerationInsert) -> Result<()> {
        let mut prompt = insert.prompt_used;
        if prompt.chars().count() > PROMPT_PERSIST_LIMIT {
            prompt = prompt.chars().take(PROMPT_PERSIST_LIMIT).collect();
        }

        sqlx::query(
            "INSERT INTO generations \
             (id, user_id, input_image_path, scene_type, player_style, prompt_used, status, is_free, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&insert.id)
        .bind(&insert.user_id)
        .bind(&insert.input_image_path)
        .bind(&insert.scene_type)
        .bind(&insert.player_style)
        .bind(&prompt)
        .bind(GenerationStatus::Processing.as_str())
        .bind(insert.is_free)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Status only moves forward; a completed or failed row never reverts.
    pub async fn mark_generation_completed(
        &self,
        generation_id: &str,
        output_image_path: Option<&str>,
        processing_time_ms: i64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE generations \
             SET status = ?, output_image_path = ?, processing_time_ms = ?, completed_at = ? \
             WHERE id = ? AND status = ?",
        )
        .bind(GenerationStatus::Completed.as_str())
        .bind(output_image_path)
        .bind(processing_time_ms)
        .bind(Utc::now())
        .bind(generation_id)
        .bind(GenerationStatus::Processing.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_generation_failed(
        &self,
        generation_id: &str,
        processing_time_ms: i64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE generations \
             SET status = ?, processing_time_ms = ?, completed_at = ? \
             WHERE id = ? AND status = ?",
        )
        .bind(GenerationStatus::Failed.as_str())
        .bind(processing_time_ms)
        .bind(Utc::now())
        .bind(generation_id)
        .bind(GenerationStatus::Processing.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_generation(&self, generation_id: &str) -> Result<Option<GenerationRow>> {
        let row = sqlx::query_as::<_, GenerationRow>(
            "SELECT id, user_id, input_image_path, scene_type, player_style, prompt_used, \
             status, output_image_path, processing_time_ms, is_free, created_at, completed_at \
             FROM generations WHERE id = ?",
        )
        .bind(generation_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_user_credits(&self, user_id: &str) -> Result<Option<UserCredits>> {
        let row = sqlx::query_as::<_, UserCredits>(
            "SELECT free_credits, paid_credits FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Spends one credit, free balance first, inside a single transaction.
    /// Returns whether a free credit was used, or None when the balance was
    /// empty.
    pub async fn spend_credit(&self, user_id: &str) -> Result<Option<bool>> {
        let mut tx = self.pool.begin().await?;

        // The balance guards make the decrement itself the arbiter; a
        // concurrent spend that got there first leaves rows_affected at 0.
        // An unknown user falls out the same way.
        let free_spent = sqlx::query(
            "UPDATE users SET free_credits = free_credits - 1 \
             WHERE id = ? AND free_credits > 0",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let used_free = if free_spent.rows_affected() > 0 {
            true
        } else {
            let paid_spent = sqlx::query(
                "UPDATE users SET paid_credits = paid_credits - 1 \
                 WHERE id = ? AND paid_credits > 0",
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
            if paid_spent.rows_affected() == 0 {
                tx.rollback().await?;
                return Ok(None);
            }
            false
        };

        sqlx::query(
            "INSERT INTO credit_transactions (id, user_id, amount, type, created_at) \
             VALUES (?, ?, -1, 'generation_spend', ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(used_free))
    }

    /// Credits a purchase, recording the transaction alongside the balance
    /// update.
    pub async fn add_credits(
        &self,
        user_id: &str,
        amount: i64,
        transaction_type: &str,
        package_name: Option<&str>,
        stripe_payment_id: Option<&str>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE users SET paid_credits = paid_credits + ? WHERE id = ?")
            .bind(amount)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO credit_transactions \
             (id, user_id, amount, type, stripe_payment_id, package_name, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(amount)
        .bind(transaction_type)
        .bind(stripe_payment_id)
        .bind(package_name)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        Database::init("sqlite::memory:")
            .await
            .expect("in-memory database")
    }

    fn sample_insert(id: &str, user_id: Option<&str>) -> GenerationInsert {
        GenerationInsert {
            id: id.to_string(),
            user_id: user_id.map(|value| value.to_string()),
            input_image_path: None,
            scene_type: "vip_tunnel".to_string(),
            player_style: "Lionel Messi".to_string(),
            prompt_used: "prompt".to_string(),
            is_free: true,
        }
    }

    #[tokio::test]
    async fn generation_status_is_monotonic() {
        let db = test_db().await;
        db.insert_generation(sample_insert("gen-1", None)).await.unwrap();

        db.mark_generation_completed("gen-1", Some("u/gen-1.jpeg"), 1234)
            .await
            .unwrap();
        db.mark_generation_failed("gen-1", 9999).await.unwrap();

        let row = db.get_generation("gen-1").await.unwrap().unwrap();
        assert_eq!(row.status, "completed");
        assert_eq!(row.processing_time_ms, Some(1234));
        assert_eq!(row.output_image_path.as_deref(), Some("u/gen-1.jpeg"));
    }

    #[tokio::test]
    async fn prompt_is_truncated_on_persist() {
        let db = test_db().await;
        let mut insert = sample_insert("gen-2", None);
        insert.prompt_used = "p".repeat(5000);
        db.insert_generation(insert).await.unwrap();

        let row = db.get_generation("gen-2").await.unwrap().unwrap();
        assert_eq!(row.prompt_used.chars().count(), 2000);
    }

    #[tokio::test]
    async fn spend_credit_prefers_free_balance_and_stops_at_zero() {
        let db = test_db().await;
        db.ensure_user("user-1", Some("fan@example.com")).await.unwrap();

        // Signup grant is 3 free credits.
        assert_eq!(db.spend_credit("user-1").await.unwrap(), Some(true));
        assert_eq!(db.spend_credit("user-1").await.unwrap(), Some(true));
        assert_eq!(db.spend_credit("user-1").await.unwrap(), Some(true));
        assert_eq!(db.spend_credit("user-1").await.unwrap(), None);

        db.add_credits("user-1", 5, "purchase", Some("starter"), Some("pi_123"))
            .await
            .unwrap();
        assert_eq!(db.spend_credit("user-1").await.unwrap(), Some(false));

        let credits = db.get_user_credits("user-1").await.unwrap().unwrap();
        assert_eq!(credits.free_credits, 0);
        assert_eq!(credits.paid_credits, 4);
    }

    #[tokio::test]
    async fn ensure_user_is_idempotent() {
        let db = test_db().await;
        db.ensure_user("user-2", None).await.unwrap();
        db.ensure_user("user-2", None).await.unwrap();
        let credits = db.get_user_credits("user-2").await.unwrap().unwrap();
        assert_eq!(credits.free_credits, 3);
    }

    #[tokio::test]
    async fn spending_for_an_unknown_user_is_a_noop() {
        let db = test_db().await;
        assert_eq!(db.spend_credit("ghost").await.unwrap(), None);
    }

    #[tokio::test]
    async fn overspending_never_drives_a_balance_negative() {
        let db = test_db().await;
        db.ensure_user("user-3", None).await.unwrap();
        db.add_credits("user-3", 2, "purchase", Some("starter"), Some("pi_456"))
            .await
            .unwrap();

        let mut spent = 0;
        for _ in 0..10 {
            if db.spend_credit("user-3").await.unwrap().is_some() {
                spent += 1;
            }
        }
        assert_eq!(spent, 5);

        let credits = db.get_user_credits("user-3").await.unwrap().unwrap();
        assert_eq!(credits.free_credits, 0);
        assert_eq!(credits.paid_credits, 0);
    }
}
