use crate::entities;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationResponse {
    pub id: String,
    pub notif_type: String,
    pub title: String,
    pub body: String,
    pub data: Option<serde_json::Value>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<entities::Notification> for NotificationResponse {
    fn from(n: entities::Notification) -> Self {
        let data = n.data.as_deref().and_then(|d| serde_json::from_str(d).ok());
        Self {
            id: n.id,
            notif_type: n.notif_type,
            title: n.title,
            body: n.body,
            data,
            is_read: n.is_read,
            created_at: n.created_at,
        }
    }
}
