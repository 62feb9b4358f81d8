use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct Voucher {
    pub id: String,
    pub user_id: String,
    pub reward_id: String,
    pub code: String,
    pub discount_amount: i64,
    pub expires_at: DateTime<Utc>,
    /// Flipped exactly once via a conditional update.
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}
