use crate::entities;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct RewardResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub points_required: i64,
    pub discount_amount: i64,
}

impl From<entities::Reward> for RewardResponse {
    fn from(r: entities::Reward) -> Self {
        Self {
            id: r.id,
            name: r.name,
            description: r.description,
            points_required: r.points_required,
            discount_amount: r.discount_amount,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RedeemRewardRequest {
    pub reward_id: String,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VoucherResponse {
    pub id: String,
    pub code: String,
    pub discount_amount: i64,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
}

impl From<entities::Voucher> for VoucherResponse {
    fn from(v: entities::Voucher) -> Self {
        Self {
            id: v.id,
            code: v.code,
            discount_amount: v.discount_amount,
            expires_at: v.expires_at,
            used: v.used,
            used_at: v.used_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RedeemRewardResponse {
    pub points: i64,
    pub voucher: VoucherResponse,
    pub replayed: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PointsResponse {
    pub points: i64,
}
