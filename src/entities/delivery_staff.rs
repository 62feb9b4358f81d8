use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct DeliveryStaff {
    pub id: String,
    pub user_id: String,
    pub vendor_id: Option<String>,
    pub phone: Option<String>,
    pub profile_photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
}
