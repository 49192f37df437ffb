//! Midtrans payment gateway adapter
//!
//! Snap API for opening payment sessions, Core API for status checks and
//! SHA-512 signed HTTP notifications.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use constant_time_eq::constant_time_eq;
use reqwest::{Client, StatusCode};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha512};
use tracing::{debug, warn};

use crate::application::ports::PaymentGateway;
use crate::config::PaymentConfig;
use crate::domain::{Booking, PaymentSession, RemoteStatus, RemoteTransaction, VerifiedNotification};
use crate::shared::errors::GatewayError;

pub struct MidtransGateway {
    http: Client,
    server_key: String,
    snap_url: String,
    api_url: String,
    expiry_duration: u32,
    expiry_unit: &'static str,
}

impl MidtransGateway {
    pub fn new(config: &PaymentConfig) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| GatewayError::GatewayUnavailable(e.to_string()))?;
        Ok(Self {
            http,
            server_key: config.server_key.clone(),
            snap_url: config.snap_base_url().trim_end_matches('/').to_string(),
            api_url: config.api_base_url().trim_end_matches('/').to_string(),
            expiry_duration: config.expiry_duration,
            expiry_unit: config.expiry_unit.as_str(),
        })
    }

    fn signature_for(&self, order_id: &str, status_code: &str, gross_amount: &str) -> String {
        let mut hasher = Sha512::new();
        hasher.update(order_id.as_bytes());
        hasher.update(status_code.as_bytes());
        hasher.update(gross_amount.as_bytes());
        hasher.update(self.server_key.as_bytes());
        hex::encode(hasher.finalize())
    }
}

// ── Wire types ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct SnapRequest<'a> {
    transaction_details: TransactionDetails<'a>,
    item_details: Vec<ItemDetail>,
    expiry: SnapExpiry<'a>,
}

#[derive(Debug, Serialize)]
struct TransactionDetails<'a> {
    order_id: &'a str,
    gross_amount: i64,
}

#[derive(Debug, Serialize)]
struct ItemDetail {
    id: String,
    price: i64,
    quantity: u32,
    name: String,
}

#[derive(Debug, Serialize)]
struct SnapExpiry<'a> {
    unit: &'a str,
    duration: u32,
}

#[derive(Debug, Deserialize)]
struct SnapResponse {
    token: String,
    redirect_url: String,
}

/// Fields shared by HTTP notifications and the status endpoint
#[derive(Debug, Default, Deserialize)]
struct StatusPayload {
    #[serde(default)]
    order_id: Option<String>,
    #[serde(default)]
    status_code: Option<String>,
    #[serde(default)]
    status_message: Option<String>,
    #[serde(default)]
    transaction_status: Option<String>,
    #[serde(default)]
    fraud_status: Option<String>,
    #[serde(default)]
    gross_amount: Option<String>,
    #[serde(default)]
    refund_amount: Option<String>,
    #[serde(default)]
    transaction_id: Option<String>,
    #[serde(default)]
    payment_type: Option<String>,
    #[serde(default)]
    signature_key: Option<String>,
    #[serde(default)]
    bank: Option<String>,
    #[serde(default)]
    issuer: Option<String>,
    #[serde(default)]
    va_numbers: Vec<VaNumber>,
}

#[derive(Debug, Deserialize)]
struct VaNumber {
    bank: String,
}

// ── Decoding ───────────────────────────────────────────────────────

/// `"450000.00"` -> 450000
fn parse_amount(raw: &str) -> Result<i64, GatewayError> {
    Decimal::from_str(raw.trim())
        .ok()
        .and_then(|d| d.trunc().to_i64())
        .ok_or_else(|| GatewayError::InvalidPayload(format!("bad amount {:?}", raw)))
}

fn map_status(payload: &StatusPayload) -> Result<RemoteStatus, GatewayError> {
    let status = payload.transaction_status.as_deref().unwrap_or_default();
    let fraud = payload.fraud_status.as_deref().unwrap_or("accept");
    let reason = || {
        payload
            .status_message
            .clone()
            .unwrap_or_else(|| status.to_string())
    };

    Ok(match status {
        "settlement" => RemoteStatus::Paid,
        "capture" if fraud == "accept" => RemoteStatus::Paid,
        "capture" | "pending" | "authorize" => RemoteStatus::Pending,
        "deny" | "failure" => RemoteStatus::Failed { reason: reason() },
        "cancel" => RemoteStatus::Cancelled { reason: reason() },
        "expire" => RemoteStatus::Expired,
        "refund" => RemoteStatus::Refunded {
            refunded_total: payload
                .refund_amount
                .as_deref()
                .map(parse_amount)
                .transpose()?,
        },
        "partial_refund" => {
            let raw = payload.refund_amount.as_deref().ok_or_else(|| {
                GatewayError::InvalidPayload("partial_refund without refund_amount".into())
            })?;
            RemoteStatus::PartiallyRefunded {
                refunded_total: parse_amount(raw)?,
            }
        }
        other => RemoteStatus::Unknown(other.to_string()),
    })
}

fn to_remote(payload: StatusPayload, raw: Value) -> Result<RemoteTransaction, GatewayError> {
    let order_id = payload
        .order_id
        .clone()
        .ok_or_else(|| GatewayError::InvalidPayload("missing order_id".into()))?;
    let status = map_status(&payload)?;
    let gross_amount = payload.gross_amount.as_deref().map(parse_amount).transpose()?;
    let channel = payload
        .va_numbers
        .first()
        .map(|va| va.bank.clone())
        .or(payload.bank)
        .or(payload.issuer);

    Ok(RemoteTransaction {
        order_id,
        status,
        transaction_id: payload.transaction_id,
        method: payload.payment_type,
        channel,
        gross_amount,
        raw,
    })
}

fn pending_for(order_id: &str, raw: Value) -> RemoteTransaction {
    RemoteTransaction {
        order_id: order_id.to_string(),
        status: RemoteStatus::Pending,
        transaction_id: None,
        method: None,
        channel: None,
        gross_amount: None,
        raw,
    }
}

fn send_error(e: reqwest::Error) -> GatewayError {
    GatewayError::GatewayUnavailable(e.to_string())
}

fn status_error(status: StatusCode, body: String) -> GatewayError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        GatewayError::GatewayUnavailable(format!("HTTP {}: {}", status.as_u16(), body))
    } else {
        GatewayError::GatewayRejected {
            status: status.as_u16(),
            message: body,
        }
    }
}

// ── PaymentGateway impl ────────────────────────────────────────────

#[async_trait]
impl PaymentGateway for MidtransGateway {
    async fn create_transaction(&self, booking: &Booking) -> Result<PaymentSession, GatewayError> {
        let body = SnapRequest {
            transaction_details: TransactionDetails {
                order_id: &booking.code,
                gross_amount: booking.total_amount,
            },
            item_details: booking
                .items
                .iter()
                .enumerate()
                .map(|(i, item)| ItemDetail {
                    id: format!("{}-{}", item.category, i + 1),
                    price: item.fare,
                    quantity: 1,
                    name: format!("{} {}", item.category, item.label),
                })
                .collect(),
            expiry: SnapExpiry {
                unit: self.expiry_unit,
                duration: self.expiry_duration,
            },
        };

        debug!(order_id = %booking.code, amount = booking.total_amount, "Creating Snap transaction");
        let resp = self
            .http
            .post(format!("{}/snap/v1/transactions", self.snap_url))
            .basic_auth(&self.server_key, Some(""))
            .json(&body)
            .send()
            .await
            .map_err(send_error)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error(status, text));
        }

        let snap: SnapResponse = resp
            .json()
            .await
            .map_err(|e| GatewayError::InvalidPayload(e.to_string()))?;
        Ok(PaymentSession {
            order_id: booking.code.clone(),
            token: snap.token,
            redirect_url: snap.redirect_url,
        })
    }

    fn verify_notification(
        &self,
        raw: &[u8],
        signature: Option<&str>,
    ) -> Result<VerifiedNotification, GatewayError> {
        let value: Value =
            serde_json::from_slice(raw).map_err(|e| GatewayError::InvalidPayload(e.to_string()))?;
        let payload: StatusPayload = serde_json::from_value(value.clone())
            .map_err(|e| GatewayError::InvalidPayload(e.to_string()))?;

        let provided = signature
            .map(str::to_string)
            .or_else(|| payload.signature_key.clone())
            .ok_or(GatewayError::InvalidSignature)?;
        let (Some(order_id), Some(status_code), Some(gross_amount)) = (
            payload.order_id.as_deref(),
            payload.status_code.as_deref(),
            payload.gross_amount.as_deref(),
        ) else {
            return Err(GatewayError::InvalidSignature);
        };

        let expected = self.signature_for(order_id, status_code, gross_amount);
        if !constant_time_eq(expected.as_bytes(), provided.to_ascii_lowercase().as_bytes()) {
            warn!(order_id, "Notification signature mismatch");
            return Err(GatewayError::InvalidSignature);
        }

        to_remote(payload, value)
    }

    async fn poll_status(&self, order_id: &str) -> Result<RemoteTransaction, GatewayError> {
        let resp = self
            .http
            .get(format!("{}/v2/{}/status", self.api_url, order_id))
            .basic_auth(&self.server_key, Some(""))
            .send()
            .await
            .map_err(send_error)?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            // Customer has not picked a payment method yet
            return Ok(pending_for(order_id, Value::Null));
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error(status, text));
        }

        let value: Value = resp
            .json()
            .await
            .map_err(|e| GatewayError::InvalidPayload(e.to_string()))?;
        let payload: StatusPayload = serde_json::from_value(value.clone())
            .map_err(|e| GatewayError::InvalidPayload(e.to_string()))?;

        // Core API reports failures in the body with HTTP 200
        match payload.status_code.as_deref() {
            Some("404") => return Ok(pending_for(order_id, value)),
            Some(code) if code.starts_with('5') => {
                return Err(GatewayError::GatewayUnavailable(format!(
                    "status {}: {}",
                    code,
                    payload.status_message.unwrap_or_default()
                )))
            }
            Some(code) if code.starts_with('4') => {
                return Err(GatewayError::GatewayRejected {
                    status: code.parse().unwrap_or(400),
                    message: payload.status_message.unwrap_or_default(),
                })
            }
            _ => {}
        }

        let mut remote = to_remote(payload, value)?;
        if remote.order_id.is_empty() {
            remote.order_id = order_id.to_string();
        }
        Ok(remote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gateway() -> MidtransGateway {
        let config = PaymentConfig {
            server_key: "SB-Mid-server-test".into(),
            ..Default::default()
        };
        MidtransGateway::new(&config).unwrap()
    }

    fn signed(gw: &MidtransGateway, mut body: Value) -> Vec<u8> {
        let sig = gw.signature_for(
            body["order_id"].as_str().unwrap(),
            body["status_code"].as_str().unwrap(),
            body["gross_amount"].as_str().unwrap(),
        );
        body["signature_key"] = json!(sig);
        serde_json::to_vec(&body).unwrap()
    }

    #[test]
    fn valid_settlement_notification_maps_to_paid() {
        let gw = gateway();
        let raw = signed(
            &gw,
            json!({
                "order_id": "FRY-261017-K3Q9ZD",
                "status_code": "200",
                "gross_amount": "450000.00",
                "transaction_status": "settlement",
                "transaction_id": "tx-1",
                "payment_type": "bank_transfer",
                "va_numbers": [{"bank": "bca", "va_number": "123"}]
            }),
        );

        let n = gw.verify_notification(&raw, None).unwrap();
        assert_eq!(n.order_id, "FRY-261017-K3Q9ZD");
        assert_eq!(n.status, RemoteStatus::Paid);
        assert_eq!(n.gross_amount, Some(450_000));
        assert_eq!(n.method.as_deref(), Some("bank_transfer"));
        assert_eq!(n.channel.as_deref(), Some("bca"));
        assert_eq!(n.raw["transaction_id"], "tx-1");
    }

    #[test]
    fn tampered_notification_is_rejected() {
        let gw = gateway();
        let raw = signed(
            &gw,
            json!({
                "order_id": "FRY-1",
                "status_code": "200",
                "gross_amount": "1000.00",
                "transaction_status": "settlement"
            }),
        );
        let mut body: Value = serde_json::from_slice(&raw).unwrap();
        body["gross_amount"] = json!("1.00");
        let tampered = serde_json::to_vec(&body).unwrap();

        assert!(matches!(
            gw.verify_notification(&tampered, None),
            Err(GatewayError::InvalidSignature)
        ));
        assert!(matches!(
            gw.verify_notification(&raw, Some("deadbeef")),
            Err(GatewayError::InvalidSignature)
        ));
    }

    #[test]
    fn unsigned_or_garbage_payloads_fail() {
        let gw = gateway();
        let unsigned = serde_json::to_vec(&json!({
            "order_id": "FRY-1",
            "status_code": "200",
            "gross_amount": "1000.00",
            "transaction_status": "settlement"
        }))
        .unwrap();
        assert!(matches!(
            gw.verify_notification(&unsigned, None),
            Err(GatewayError::InvalidSignature)
        ));
        assert!(matches!(
            gw.verify_notification(b"not json", None),
            Err(GatewayError::InvalidPayload(_))
        ));
    }

    #[test]
    fn status_mapping() {
        let status = |tx: &str, fraud: Option<&str>, refund: Option<&str>| {
            map_status(&StatusPayload {
                transaction_status: Some(tx.into()),
                fraud_status: fraud.map(Into::into),
                refund_amount: refund.map(Into::into),
                ..Default::default()
            })
            .unwrap()
        };

        assert_eq!(status("capture", Some("accept"), None), RemoteStatus::Paid);
        assert_eq!(status("capture", Some("challenge"), None), RemoteStatus::Pending);
        assert_eq!(status("authorize", None, None), RemoteStatus::Pending);
        assert_eq!(status("expire", None, None), RemoteStatus::Expired);
        assert!(matches!(status("deny", None, None), RemoteStatus::Failed { .. }));
        assert!(matches!(status("failure", None, None), RemoteStatus::Failed { .. }));
        assert!(matches!(status("cancel", None, None), RemoteStatus::Cancelled { .. }));
        assert_eq!(
            status("refund", None, None),
            RemoteStatus::Refunded { refunded_total: None }
        );
        assert_eq!(
            status("partial_refund", None, Some("100000.00")),
            RemoteStatus::PartiallyRefunded { refunded_total: 100_000 }
        );
        assert_eq!(
            status("chargeback", None, None),
            RemoteStatus::Unknown("chargeback".into())
        );
    }

    #[test]
    fn amounts_parse_from_decimal_strings() {
        assert_eq!(parse_amount("450000.00").unwrap(), 450_000);
        assert_eq!(parse_amount("75000").unwrap(), 75_000);
        assert!(parse_amount("abc").is_err());
    }

    #[test]
    fn http_status_classification() {
        assert!(status_error(StatusCode::BAD_GATEWAY, String::new()).is_retryable());
        assert!(status_error(StatusCode::TOO_MANY_REQUESTS, String::new()).is_retryable());
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "bad key".into()),
            GatewayError::GatewayRejected { status: 401, .. }
        ));
    }
}
