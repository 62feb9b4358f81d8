use crate::domain::{OrderStatus, UiStatus};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

/// Payload pushed to connected clients when an order changes. Delivery is
/// best effort and at most once; clients reconcile by refetching.
#[derive(Debug, Clone, Serialize)]
pub struct OrderEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub order_id: String,
    pub order_code: String,
    pub status: OrderStatus,
    pub ui_status: UiStatus,
    pub vendor_id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staff_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward_points: Option<i64>,
}

impl OrderEvent {
    /// Subscription keys this event fans out to.
    fn audience(&self) -> Vec<String> {
        let mut keys = vec![
            format!("vendor:{}", self.vendor_id),
            format!("user:{}", self.user_id),
        ];
        if let Some(staff) = &self.staff_user_id {
            keys.push(format!("staff:{staff}"));
        }
        keys
    }
}

type Subscribers = HashMap<String, HashMap<u64, mpsc::UnboundedSender<String>>>;

/// Process-local fan-out registry for order events. Sessions register
/// under audience keys ("vendor:<id>", "user:<id>", "staff:<id>"); a
/// publish serializes the event once and pushes it to every live session
/// under the matching keys. Closed sessions are pruned on the next send.
#[derive(Clone, Default)]
pub struct RealtimeHub {
    inner: Arc<RwLock<Subscribers>>,
    next_id: Arc<AtomicU64>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vendor_key(vendor_id: &str) -> String {
        format!("vendor:{vendor_id}")
    }

    pub fn user_key(user_id: &str) -> String {
        format!("user:{user_id}")
    }

    pub fn staff_key(staff_user_id: &str) -> String {
        format!("staff:{staff_user_id}")
    }

    /// Registers a session under the given keys. Returns the connection id
    /// to pass back to [`RealtimeHub::unsubscribe`] and the receiving end
    /// the session task drains.
    pub fn subscribe(&self, keys: &[String]) -> (u64, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut subs = self.inner.write().unwrap_or_else(|e| e.into_inner());
        for key in keys {
            subs.entry(key.clone()).or_default().insert(conn_id, tx.clone());
        }
        (conn_id, rx)
    }

    pub fn unsubscribe(&self, conn_id: u64, keys: &[String]) {
        let mut subs = self.inner.write().unwrap_or_else(|e| e.into_inner());
        for key in keys {
            if let Some(sessions) = subs.get_mut(key) {
                sessions.remove(&conn_id);
                if sessions.is_empty() {
                    subs.remove(key);
                }
            }
        }
    }

    /// Fans the event out to its audience. Send failures mean the session
    /// is gone; those entries are dropped and the publish continues.
    pub fn publish(&self, event: &OrderEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(p) => p,
            Err(e) => {
                log::error!("Failed to serialize order event: {e}");
                return;
            }
        };

        let mut subs = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let mut delivered = 0usize;
        for key in event.audience() {
            if let Some(sessions) = subs.get_mut(&key) {
                sessions.retain(|_, tx| tx.send(payload.clone()).is_ok());
                delivered += sessions.len();
                if sessions.is_empty() {
                    subs.remove(&key);
                }
            }
        }
        log::debug!(
            "Order event {} for {} delivered to {delivered} session(s)",
            event.event_type,
            event.order_id
        );
    }

    #[cfg(test)]
    fn session_count(&self, key: &str) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .map(|s| s.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(vendor: &str, user: &str, staff: Option<&str>) -> OrderEvent {
        OrderEvent {
            event_type: "order_status_changed".to_string(),
            order_id: "o1".to_string(),
            order_code: "BB-0A1B2C3D".to_string(),
            status: OrderStatus::Preparing,
            ui_status: OrderStatus::Preparing.ui_status(),
            vendor_id: vendor.to_string(),
            user_id: user.to_string(),
            staff_user_id: staff.map(str::to_string),
            reward_points: None,
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_vendor_and_user() {
        let hub = RealtimeHub::new();
        let (_, mut vendor_rx) = hub.subscribe(&[RealtimeHub::vendor_key("v1")]);
        let (_, mut user_rx) = hub.subscribe(&[RealtimeHub::user_key("u1")]);
        let (_, mut other_rx) = hub.subscribe(&[RealtimeHub::user_key("u2")]);

        hub.publish(&event("v1", "u1", None));

        let msg = vendor_rx.try_recv().expect("vendor receives");
        assert!(msg.contains("\"ui_status\":\"preparing\""));
        assert!(user_rx.try_recv().is_ok());
        assert!(other_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_staff_audience_included_when_assigned() {
        let hub = RealtimeHub::new();
        let (_, mut staff_rx) = hub.subscribe(&[RealtimeHub::staff_key("s1")]);

        hub.publish(&event("v1", "u1", None));
        assert!(staff_rx.try_recv().is_err());

        hub.publish(&event("v1", "u1", Some("s1")));
        assert!(staff_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_closed_sessions_are_pruned() {
        let hub = RealtimeHub::new();
        let key = RealtimeHub::vendor_key("v1");
        let (_, rx) = hub.subscribe(&[key.clone()]);
        drop(rx);

        assert_eq!(hub.session_count(&key), 1);
        hub.publish(&event("v1", "u1", None));
        assert_eq!(hub.session_count(&key), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_session() {
        let hub = RealtimeHub::new();
        let key = RealtimeHub::user_key("u1");
        let (conn_id, _rx) = hub.subscribe(&[key.clone()]);
        hub.unsubscribe(conn_id, &[key.clone()]);
        assert_eq!(hub.session_count(&key), 0);
    }
}
