use crate::config::PaymentsConfig;
use crate::error::{AppError, AppResult};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize)]
struct CreateCheckoutRequest<'a> {
    reference: &'a str,
    amount: i64,
    currency: &'a str,
    method: &'a str,
    description: &'a str,
    return_url: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSession {
    pub checkout_url: String,
    pub reference: String,
}

#[derive(Debug, Deserialize)]
pub struct ProviderPaymentStatus {
    pub reference: String,
    /// "pending", "paid" or "failed".
    pub status: String,
}

/// Thin client for the hosted checkout provider. Every call carries a
/// bounded timeout; reads retry once, writes never retry without the
/// caller-supplied reference acting as the provider-side idempotency key.
#[derive(Clone)]
pub struct PaymentsService {
    client: Client,
    config: PaymentsConfig,
}

impl PaymentsService {
    pub fn new(config: PaymentsConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    /// Creates a hosted checkout session for a wallet top-up and returns
    /// the redirect descriptor.
    pub async fn create_checkout(
        &self,
        reference: &str,
        amount: i64,
        method: &str,
        description: &str,
    ) -> AppResult<CheckoutSession> {
        let url = format!("{}/v1/checkouts", self.config.base_url);
        let body = CreateCheckoutRequest {
            reference,
            amount,
            currency: "PHP",
            method,
            description,
            return_url: &self.config.return_url,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        if response.status().is_success() {
            let session: CheckoutSession = response.json().await?;
            Ok(session)
        } else {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            log::error!("Checkout creation failed ({status}): {error_text}");
            Err(AppError::ExternalApiError(format!(
                "Checkout creation failed with status {status}"
            )))
        }
    }

    /// Fetches the provider-side payment status. Read path: retries once
    /// with a short backoff on transport failure.
    pub async fn get_payment_status(&self, reference: &str) -> AppResult<ProviderPaymentStatus> {
        let url = format!("{}/v1/payments/{}", self.config.base_url, reference);

        let mut last_err = None;
        for attempt in 0..2 {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
            match self.client.get(&url).send().await {
                Ok(response) => {
                    if response.status().is_success() {
                        let status: ProviderPaymentStatus = response.json().await?;
                        return Ok(status);
                    }
                    if response.status() == reqwest::StatusCode::NOT_FOUND {
                        return Err(AppError::NotFound(format!(
                            "Payment {reference} not found at provider"
                        )));
                    }
                    let status = response.status();
                    return Err(AppError::ExternalApiError(format!(
                        "Payment status fetch failed with status {status}"
                    )));
                }
                Err(e) => last_err = Some(e),
            }
        }

        Err(classify_transport_error(last_err.expect("retry loop ran")))
    }

    /// Verifies the HMAC-SHA256 signature the provider sends over the raw
    /// webhook body. Must pass before any webhook-driven state change.
    pub fn verify_webhook_signature(&self, payload: &[u8], signature_hex: &str) -> AppResult<()> {
        if self.config.webhook_secret.is_empty() {
            return Err(AppError::AuthError(
                "Webhook secret is not configured".to_string(),
            ));
        }
        let signature = decode_hex(signature_hex.trim())
            .ok_or_else(|| AppError::AuthError("Malformed webhook signature".to_string()))?;

        let mut mac = HmacSha256::new_from_slice(self.config.webhook_secret.as_bytes())
            .map_err(|e| AppError::InternalError(format!("HMAC init failed: {e}")))?;
        mac.update(payload);
        mac.verify_slice(&signature)
            .map_err(|_| AppError::AuthError("Invalid webhook signature".to_string()))
    }

    /// Computes the signature for a payload; used by tests and by the
    /// provider simulator in local development.
    pub fn sign_payload(&self, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(self.config.webhook_secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(payload);
        encode_hex(&mac.finalize().into_bytes())
    }
}

fn classify_transport_error(e: reqwest::Error) -> AppError {
    if e.is_timeout() || e.is_connect() {
        AppError::ServiceUnavailable(format!("Payment provider unreachable: {e}"))
    } else {
        AppError::ReqwestError(e)
    }
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PaymentsConfig;

    fn service() -> PaymentsService {
        PaymentsService::new(PaymentsConfig {
            base_url: "https://pay.example.com".to_string(),
            return_url: "https://app.example.com/wallet".to_string(),
            webhook_secret: "whsec_test".to_string(),
            request_timeout_secs: 10,
        })
    }

    #[test]
    fn test_signature_roundtrip() {
        let svc = service();
        let payload = br#"{"event_type":"payment.succeeded","reference":"TOPUP-1"}"#;
        let sig = svc.sign_payload(payload);
        assert!(svc.verify_webhook_signature(payload, &sig).is_ok());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let svc = service();
        let sig = svc.sign_payload(b"original");
        assert!(svc.verify_webhook_signature(b"tampered", &sig).is_err());
    }

    #[test]
    fn test_malformed_signature_rejected() {
        let svc = service();
        assert!(svc.verify_webhook_signature(b"x", "not-hex").is_err());
        assert!(svc.verify_webhook_signature(b"x", "abc").is_err()); // odd length
    }
}
