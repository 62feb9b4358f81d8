use crate::external::PaymentsService;
use crate::models::PaymentWebhookEvent;
use crate::services::WalletService;
use actix_web::{web, HttpRequest, HttpResponse, Result};

/// Payment provider status webhook. The HMAC signature over the raw body
/// is verified before anything is parsed; processing failures after a
/// valid signature still ack with 200 so the provider does not retry a
/// payload we have durably rejected.
pub async fn payments_webhook(
    req: HttpRequest,
    body: web::Bytes,
    payments_service: web::Data<PaymentsService>,
    wallet_service: web::Data<WalletService>,
) -> Result<HttpResponse> {
    let signature = match req.headers().get("X-Webhook-Signature") {
        Some(sig) => sig.to_str().unwrap_or(""),
        None => {
            log::warn!("Webhook request without signature header");
            return Ok(HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "Missing X-Webhook-Signature header"
            })));
        }
    };

    if let Err(e) = payments_service.verify_webhook_signature(&body, signature) {
        log::warn!("Webhook signature verification failed: {e}");
        return Ok(HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Invalid signature"
        })));
    }

    let event: PaymentWebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            log::warn!("Malformed webhook payload: {e}");
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Malformed payload"
            })));
        }
    };

    log::info!("Webhook event {} for {}", event.event_type, event.reference);

    match wallet_service.apply_webhook_event(&event).await {
        Ok(()) => Ok(HttpResponse::Ok().json(serde_json::json!({ "received": true }))),
        Err(e) => {
            // A replayed settlement lands here as a conflict; that is a
            // success from the provider's point of view.
            log::warn!("Webhook processing failed for {}: {e}", event.reference);
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "received": true,
                "error": format!("Processing failed: {e}")
            })))
        }
    }
}

pub fn webhook_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/webhook/payments", web::post().to(payments_webhook));
}
