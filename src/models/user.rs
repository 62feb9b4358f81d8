use crate::domain::Role;
use crate::entities;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    /// "student" or "vendor"; vendor registrations land as applications
    /// pending admin approval.
    pub role: String,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub business_address: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub organization: Option<String>,
    pub phone: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl UserResponse {
    pub fn from_entity(u: entities::User) -> Self {
        let role = u.role.parse().unwrap_or(Role::Student);
        Self {
            id: u.id,
            email: u.email,
            full_name: u.full_name,
            role,
            organization: u.organization,
            phone: u.phone,
            status: u.status,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub tokens: TokenResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StudentProfileResponse {
    pub organization_name: Option<String>,
    pub points: i64,
    pub wallet_balance: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VendorApplicationResponse {
    pub user_id: String,
    pub email: String,
    pub full_name: String,
    pub business_name: String,
    pub business_address: Option<String>,
    pub approval_status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminStatsResponse {
    pub total_students: i64,
    pub total_vendors: i64,
    pub pending_vendor_applications: i64,
    pub total_orders: i64,
    pub completed_orders: i64,
    /// Centavos across non-rejected orders.
    pub gross_revenue: i64,
    /// Centavos credited back through the refund engine.
    pub refunds_approved: i64,
}
