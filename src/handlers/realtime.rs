use crate::realtime::RealtimeHub;
use actix_web::{web, HttpRequest, HttpResponse, Result};
use futures_util::StreamExt;
use serde::Deserialize;
use std::time::Duration;

const PING_INTERVAL: Duration = Duration::from_secs(25);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeQuery {
    pub vendor_id: Option<String>,
    pub user_id: Option<String>,
    pub staff_user_id: Option<String>,
}

impl SubscribeQuery {
    fn keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        if let Some(v) = &self.vendor_id {
            keys.push(RealtimeHub::vendor_key(v));
        }
        if let Some(u) = &self.user_id {
            keys.push(RealtimeHub::user_key(u));
        }
        if let Some(s) = &self.staff_user_id {
            keys.push(RealtimeHub::staff_key(s));
        }
        keys
    }
}

/// Websocket feed of order events. The session subscribes under the ids
/// given in the query string and receives JSON events until either side
/// closes; pings keep idle connections alive through proxies.
pub async fn orders_ws(
    req: HttpRequest,
    body: web::Payload,
    hub: web::Data<RealtimeHub>,
    query: web::Query<SubscribeQuery>,
) -> Result<HttpResponse> {
    let keys = query.keys();
    if keys.is_empty() {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "error": "At least one of vendorId, userId, staffUserId is required"
        })));
    }

    let (response, mut session, mut msg_stream) = actix_ws::handle(&req, body)?;

    let hub = hub.into_inner();
    let (conn_id, mut events) = hub.subscribe(&keys);
    log::debug!("Websocket {conn_id} subscribed to {keys:?}");

    actix_web::rt::spawn(async move {
        let mut ping = tokio::time::interval(PING_INTERVAL);
        ping.tick().await; // first tick fires immediately

        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Some(payload) => {
                            if session.text(payload).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                msg = msg_stream.next() => {
                    match msg {
                        Some(Ok(actix_ws::Message::Ping(bytes))) => {
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(actix_ws::Message::Close(_))) | None => break,
                        Some(Ok(_)) => {} // inbound text/binary is ignored
                        Some(Err(_)) => break,
                    }
                }
                _ = ping.tick() => {
                    if session.ping(b"").await.is_err() {
                        break;
                    }
                }
            }
        }

        hub.unsubscribe(conn_id, &keys);
        let _ = session.close(None).await;
        log::debug!("Websocket {conn_id} disconnected");
    });

    Ok(response)
}

pub fn realtime_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/ws/orders", web::get().to(orders_ws));
}
