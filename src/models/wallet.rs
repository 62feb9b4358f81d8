use crate::entities;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct WalletResponse {
    pub id: String,
    /// Balance in centavos.
    pub balance: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionResponse {
    pub id: String,
    pub tx_type: String,
    pub amount: i64,
    pub description: Option<String>,
    pub payment_method: String,
    pub status: String,
    pub order_id: Option<String>,
    pub date: DateTime<Utc>,
}

impl From<entities::Transaction> for TransactionResponse {
    fn from(t: entities::Transaction) -> Self {
        Self {
            id: t.id,
            tx_type: t.tx_type,
            amount: t.amount,
            description: t.description,
            payment_method: t.payment_method,
            status: t.status,
            order_id: t.order_id,
            date: t.transaction_date,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TopUpRequest {
    /// Centavos.
    pub amount: i64,
    /// "gcash", "bank" or "card".
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TopUpResponse {
    pub transaction: TransactionResponse,
    /// Where the client sends the customer to complete payment; None when
    /// the request replayed an existing transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    pub replayed: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmTopUpRequest {
    /// Transaction id or provider reference of the pending top-up.
    pub reference: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfirmTopUpResponse {
    pub transaction: TransactionResponse,
    pub new_balance: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PayRequest {
    /// Centavos.
    pub amount: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PayResponse {
    pub transaction: TransactionResponse,
    pub new_balance: i64,
    pub replayed: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TransactionsQuery {
    pub limit: Option<i64>,
}

/// Body of the payment provider's status webhook. The signature over the
/// raw body is verified before this is parsed.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentWebhookEvent {
    pub event_type: String,
    pub reference: String,
    #[serde(default)]
    pub amount: Option<i64>,
}
