use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct MenuItem {
    pub id: String,
    pub vendor_id: String,
    pub name: String,
    pub description: String,
    /// Unit price in centavos.
    pub price: i64,
    pub category: String,
    pub image_url: Option<String>,
    pub is_available: bool,
    pub has_discount: bool,
    pub discount_percentage: i64,
    pub is_promoted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
