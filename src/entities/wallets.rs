use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct Wallet {
    pub id: String,
    pub user_id: String,
    /// Balance in centavos; never negative (CHECK + conditional debits).
    pub balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
