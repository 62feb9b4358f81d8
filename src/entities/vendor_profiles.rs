use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct VendorProfile {
    pub id: String,
    pub user_id: String,
    pub business_name: String,
    pub business_address: Option<String>,
    pub approval_status: String,
    pub logo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
