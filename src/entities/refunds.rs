use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct Refund {
    pub id: String,
    pub order_id: String,
    pub user_id: String,
    pub vendor_id: String,
    pub reason: Option<String>,
    pub amount: i64,
    pub refund_type: String,
    pub status: String,
    pub evidence: Option<String>,
    pub processed_by: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
