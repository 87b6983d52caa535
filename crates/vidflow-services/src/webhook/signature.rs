//! Webhook signature verification.
//!
//! Header format: `t=<unix_ts>,v1=<hex_hmac>` where the MAC is
//! HMAC-SHA256(secret, "{t}.{raw_body}").

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;
use subtle::ConstantTimeEq;
use vidflow_core::AppError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "provider-signature";

#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Vec<u8>,
    tolerance: Duration,
}

impl WebhookVerifier {
    pub fn new(secret: impl AsRef<[u8]>, tolerance: Duration) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            tolerance,
        }
    }

    pub fn verify(&self, header: &str, body: &[u8]) -> Result<(), AppError> {
        self.verify_at(header, body, Utc::now().timestamp())
    }

    /// Verify against an explicit clock, in unix seconds.
    pub fn verify_at(&self, header: &str, body: &[u8], now: i64) -> Result<(), AppError> {
        let (timestamp, signatures) = parse_header(header)?;

        let age = now.abs_diff(timestamp);
        if age > self.tolerance.as_secs() {
            tracing::warn!(timestamp, now, "Webhook signature outside tolerance window");
            return Err(AppError::InvalidSignature(
                "Signature timestamp outside tolerance".to_string(),
            ));
        }

        let expected = compute(&self.secret, timestamp, body)?;
        let matched = signatures.iter().any(|candidate| {
            hex::decode(candidate)
                .map(|bytes| bool::from(bytes.as_slice().ct_eq(expected.as_slice())))
                .unwrap_or(false)
        });

        if !matched {
            tracing::warn!("Webhook signature mismatch");
            return Err(AppError::InvalidSignature(
                "Signature does not match payload".to_string(),
            ));
        }
        Ok(())
    }

    /// Build a header value for `body`. Used by tests and local tooling.
    pub fn sign(&self, timestamp: i64, body: &[u8]) -> Result<String, AppError> {
        let mac = compute(&self.secret, timestamp, body)?;
        Ok(format!("t={},v1={}", timestamp, hex::encode(mac)))
    }
}

fn compute(secret: &[u8], timestamp: i64, body: &[u8]) -> Result<Vec<u8>, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Configuration(format!("Invalid webhook secret: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn parse_header(header: &str) -> Result<(i64, Vec<&str>), AppError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key.trim() {
            "t" => timestamp = value.trim().parse::<i64>().ok(),
            "v1" => signatures.push(value.trim()),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        AppError::InvalidSignature("Signature header has no valid timestamp".to_string())
    })?;
    if signatures.is_empty() {
        return Err(AppError::InvalidSignature(
            "Signature header has no v1 signature".to_string(),
        ));
    }
    Ok((timestamp, signatures))
}
