use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Append-only ledger entry. Status moves pending -> completed or
/// pending -> failed at most once, enforced by conditional updates.
#[derive(Debug, Clone, FromRow)]
pub struct Transaction {
    pub id: String,
    pub wallet_id: String,
    pub tx_type: String,
    /// Centavos, always positive; `tx_type` carries the sign.
    pub amount: i64,
    pub description: Option<String>,
    pub payment_method: String,
    pub status: String,
    pub order_id: Option<String>,
    pub idempotency_key: Option<String>,
    pub provider_reference: Option<String>,
    pub transaction_date: DateTime<Utc>,
}
