use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub role: String,
    pub notif_type: String,
    pub title: String,
    pub body: String,
    pub data: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
