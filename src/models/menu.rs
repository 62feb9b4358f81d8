use crate::entities;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateMenuItemRequest {
    pub name: String,
    pub description: String,
    /// Centavos.
    pub price: i64,
    pub category: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_available: bool,
    #[serde(default)]
    pub has_discount: bool,
    #[serde(default)]
    pub discount_percentage: i64,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateMenuItemRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub is_available: Option<bool>,
    pub has_discount: Option<bool>,
    pub discount_percentage: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MenuItemResponse {
    pub id: String,
    pub vendor_id: String,
    pub name: String,
    pub description: String,
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

impl From<entities::MenuItem> for MenuItemResponse {
    fn from(m: entities::MenuItem) -> Self {
        Self {
            id: m.id,
            vendor_id: m.vendor_id,
            name: m.name,
            description: m.description,
            price: m.price,
            category: m.category,
            image_url: m.image_url,
            is_available: m.is_available,
            has_discount: m.has_discount,
            discount_percentage: m.discount_percentage,
            is_promoted: m.is_promoted,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VendorSummaryResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub business_address: Option<String>,
    pub logo_url: Option<String>,
}
