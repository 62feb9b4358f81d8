use crate::domain::{RefundDecision, RefundType};
use crate::entities;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    /// Issue category, e.g. "NOT_DELIVERED", "LATE", "WRONG_ITEMS".
    pub issue: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub delay_minutes: Option<i64>,
    /// Photo URLs backing a QUALITY claim.
    #[serde(default)]
    pub evidence: Vec<String>,
    /// Names of the wrong/missing items; empty claims the whole order.
    #[serde(default)]
    pub items: Vec<String>,
    /// Who initiated a CANCELLED claim ("vendor", "rider", "customer").
    #[serde(default)]
    pub initiated_by: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefundResponse {
    pub status: String,
    pub approved_amount: i64,
    pub refund_type: RefundType,
    /// "wallet" when the amount was auto-credited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl RefundResponse {
    pub fn from_decision(decision: &RefundDecision, credited: bool) -> Self {
        Self {
            status: if credited { "APPROVED" } else { "PENDING" }.to_string(),
            approved_amount: decision.approved_amount,
            refund_type: decision.refund_type,
            method: credited.then(|| "wallet".to_string()),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefundRecordResponse {
    pub id: String,
    pub order_id: String,
    pub reason: Option<String>,
    pub amount: i64,
    pub refund_type: String,
    pub status: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<entities::Refund> for RefundRecordResponse {
    fn from(r: entities::Refund) -> Self {
        Self {
            id: r.id,
            order_id: r.order_id,
            reason: r.reason,
            amount: r.amount,
            refund_type: r.refund_type,
            status: r.status,
            description: r.description,
            created_at: r.created_at,
        }
    }
}
