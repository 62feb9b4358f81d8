use crate::database::DbPool;
use crate::entities::Notification;
use crate::error::{AppError, AppResult};
use crate::models::NotificationResponse;
use chrono::Utc;
use uuid::Uuid;

#[derive(Clone)]
pub struct NotificationService {
    pool: DbPool,
}

impl NotificationService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Persists an in-app notification. Failures are surfaced to the
    /// caller, who decides whether they abort the surrounding operation.
    pub async fn notify(
        &self,
        user_id: &str,
        role: &str,
        notif_type: &str,
        title: &str,
        body: &str,
        data: Option<serde_json::Value>,
    ) -> AppResult<()> {
        let data_json = data.map(|d| d.to_string());
        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, role, notif_type, title, body, data, is_read, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(role)
        .bind(notif_type)
        .bind(title)
        .bind(body)
        .bind(data_json)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list(
        &self,
        user_id: &str,
        limit: Option<i64>,
    ) -> AppResult<Vec<NotificationResponse>> {
        let limit = limit.unwrap_or(50).clamp(1, 200);
        let rows = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE user_id = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(NotificationResponse::from).collect())
    }

    pub async fn mark_read(&self, user_id: &str, notification_id: &str) -> AppResult<()> {
        let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ? AND user_id = ?")
            .bind(notification_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Notification {notification_id} not found"
            )));
        }
        Ok(())
    }

    pub async fn mark_all_read(&self, user_id: &str) -> AppResult<u64> {
        let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE user_id = ? AND is_read = 0")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
