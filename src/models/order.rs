use crate::domain::{OrderStatus, UiStatus};
use crate::entities;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One denormalized item line as stored on the order row.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub item_id: Option<String>,
    pub item_name: String,
    pub quantity: i64,
    /// Unit price in centavos.
    pub price: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customizations: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderItem {
    pub id: Option<String>,
    pub name: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    pub price: i64,
    #[serde(default)]
    pub customizations: Option<serde_json::Value>,
}

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub restaurant_id: String,
    pub items: Vec<CreateOrderItem>,
    /// "wallet" or "cash".
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub applied_deal_id: Option<String>,
    #[serde(default)]
    pub discount_amount: Option<i64>,
    #[serde(default)]
    pub voucher_code: Option<String>,
    /// "delivery" or "pickup".
    #[serde(default)]
    pub service_type: Option<String>,
}

/// Discount/fulfillment metadata carried on the order row as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderPromos {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_deal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voucher_code: Option<String>,
    pub discount_amount: i64,
    pub original_subtotal: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fulfillment: Option<String>,
    pub payment_method: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    /// Either a UI status ("preparing", "ready", "completed", "cancelled")
    /// or an internal status string ("CONFIRMED", "PAYMENT_PROCESSING", ...).
    pub status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeliveryStatusUpdateRequest {
    /// "picked-up", "arriving", "delivered" or "completed".
    pub status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RateOrderRequest {
    pub rating: i64,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeliveryStaffInfo {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub profile_photo_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: String,
    pub order_code: String,
    pub status: OrderStatus,
    pub ui_status: UiStatus,
    pub items: Vec<OrderItem>,
    pub total: i64,
    pub payment_method: String,
    pub rating: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promos: Option<OrderPromos>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_staff: Option<DeliveryStaffInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderResponse {
    /// Build from a row; unparseable JSON columns degrade to empty values
    /// rather than failing the read path.
    pub fn from_entity(order: entities::Order) -> Self {
        let status: OrderStatus = order
            .status
            .parse()
            .unwrap_or(OrderStatus::PendingConfirmation);
        let items: Vec<OrderItem> = serde_json::from_str(&order.items).unwrap_or_default();
        let promos: Option<OrderPromos> = order
            .promos
            .as_deref()
            .and_then(|p| serde_json::from_str(p).ok());
        Self {
            id: order.id,
            order_code: order.order_code,
            status,
            ui_status: status.ui_status(),
            items,
            total: order.total,
            payment_method: order.payment_method,
            rating: order.rating,
            promos,
            delivery_staff: None,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

/// Vendor/courier facing summary with customer context.
#[derive(Debug, Serialize, ToSchema)]
pub struct DeliveryOrderResponse {
    pub id: String,
    pub order_code: String,
    pub status: OrderStatus,
    pub ui_status: UiStatus,
    pub total: i64,
    pub items: Vec<OrderItem>,
    pub customer_name: Option<String>,
    pub restaurant_name: Option<String>,
    pub pickup_address: Option<String>,
    pub delivery_address: Option<String>,
    pub assigned_staff_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderListQuery {
    /// Optional UI-status filter.
    pub status: Option<String>,
}
