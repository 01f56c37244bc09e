//! Contracts for the two model-backed features: reading payment details off a
//! QR code photo, and summarising spending.
//!
//! The model itself is opaque. Only the input checks and the output shapes
//! live here.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::currency::Money;
use crate::dashboard::Transaction;
use crate::ledger::LedgerError;

/// Largest accepted image, after base64 decoding.
pub const MAX_IMAGE_BYTES: usize = 4 * 1024 * 1024;

pub const ACCEPTED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/webp", "image/gif"];

/// Errors from the model-backed services.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AiError {
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error("AI service not configured: {0}")]
    NotConfigured(String),
    #[error("AI service failed: {0}")]
    ServiceFailure(String),
    #[error("AI service returned an unexpected response: {0}")]
    MalformedResponse(String),
}

/// A validated `data:<mime>;base64,<payload>` image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageDataUri {
    mime_type: String,
    base64_data: String,
    byte_len: usize,
}

impl ImageDataUri {
    pub fn parse(uri: &str) -> Result<Self, AiError> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| AiError::InvalidImage("expected a data: URI".into()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| AiError::InvalidImage("data URI has no payload".into()))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| AiError::InvalidImage("data URI must be base64-encoded".into()))?
            .to_ascii_lowercase();

        if !ACCEPTED_IMAGE_TYPES.contains(&mime_type.as_str()) {
            return Err(AiError::InvalidImage(format!(
                "unsupported image type {mime_type:?}, expected one of {}",
                ACCEPTED_IMAGE_TYPES.join(", ")
            )));
        }

        // Reject oversized payloads before decoding them.
        if payload.len() / 4 * 3 > MAX_IMAGE_BYTES + 3 {
            return Err(too_large());
        }
        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| AiError::InvalidImage(format!("payload is not valid base64: {e}")))?;
        if bytes.is_empty() {
            return Err(AiError::InvalidImage("image is empty".into()));
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(too_large());
        }

        Ok(Self {
            mime_type,
            base64_data: payload.to_string(),
            byte_len: bytes.len(),
        })
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn base64_data(&self) -> &str {
        &self.base64_data
    }

    pub fn byte_len(&self) -> usize {
        self.byte_len
    }
}

fn too_large() -> AiError {
    AiError::InvalidImage(format!(
        "image exceeds {} MB limit",
        MAX_IMAGE_BYTES / (1024 * 1024)
    ))
}

/// Details read off a payment QR code.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    pub recipient_address: String,
    pub payment_amount: f64,
}

impl PaymentDetails {
    /// The amount as a ledger-ready positive value.
    pub fn amount(&self) -> Result<Money, LedgerError> {
        Money::from_dollars(self.payment_amount)
            .filter(Money::is_positive)
            .ok_or_else(|| {
                LedgerError::InvalidAmount(format!(
                    "extracted amount {} is not a positive amount",
                    self.payment_amount
                ))
            })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub title: String,
    pub description: String,
    pub tip: String,
    pub category: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendingInsights {
    pub summary: String,
    pub insights: Vec<Insight>,
}

/// Reads payment details from a QR code image.
#[allow(async_fn_in_trait)]
pub trait QrExtractor {
    async fn extract_payment_details(&self, image: &ImageDataUri) -> Result<PaymentDetails, AiError>;

    /// Human-readable backend name (e.g. "gemini", "offline").
    fn backend_name(&self) -> &str;
}

/// Produces natural-language spending insights from transaction history.
///
/// Independent of the wallet: it only ever sees the transaction list.
#[allow(async_fn_in_trait)]
pub trait InsightsAdvisor {
    async fn spending_insights(&self, transactions: &[Transaction]) -> Result<SpendingInsights, AiError>;
}
