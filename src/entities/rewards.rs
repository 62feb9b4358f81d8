use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct Reward {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub points_required: i64,
    /// Voucher face value in centavos.
    pub discount_amount: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
