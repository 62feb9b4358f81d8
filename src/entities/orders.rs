use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// One purchase. `items` and `promos` are JSON blobs denormalized onto the
/// row; `status` holds an [`crate::domain::OrderStatus`] string validated by
/// a CHECK constraint.
#[derive(Debug, Clone, FromRow)]
pub struct Order {
    pub id: String,
    pub order_code: String,
    pub user_id: String,
    pub restaurant_id: String,
    pub items: String,
    /// Total in centavos.
    pub total: i64,
    pub payment_method: String,
    pub status: String,
    pub assigned_staff_id: Option<String>,
    pub rating: Option<i64>,
    pub promos: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
