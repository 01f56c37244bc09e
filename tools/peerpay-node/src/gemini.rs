//! Google Gemini backend for QR extraction and spending insights.
//!
//! Both features send a single `generateContent` request in JSON response
//! mode and decode the reply into the shared output types. Transport errors,
//! 429 and 5xx are retried with exponential backoff; other failures are not.

use std::time::Duration;

use peerpay_common::ai::{
    AiError, ImageDataUri, InsightsAdvisor, PaymentDetails, QrExtractor, SpendingInsights,
};
use peerpay_common::dashboard::Transaction;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::AiConfig;

const MAX_BACKOFF: Duration = Duration::from_secs(10);

const QR_PROMPT: &str = "You are reading a payment QR code from a photo. \
Extract the recipient's payment address and the requested payment amount. \
Respond with JSON only: {\"recipientAddress\": string, \"paymentAmount\": number}. \
The amount is a plain number in dollars without currency symbols.";

const INSIGHTS_PROMPT: &str = "You are a personal finance assistant. \
Analyse the user's transactions below (negative amounts are spending) and respond with JSON only: \
{\"summary\": string, \"insights\": [{\"title\": string, \"description\": string, \"tip\": string, \"category\": string}]}. \
Give at most four insights, each tied to one spending category, with a concrete money-saving tip.";

// ── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f64,
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    fn image(image: &ImageDataUri) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: image.mime_type().to_string(),
                data: image.base64_data().to_string(),
            }),
        }
    }
}

fn build_request(parts: Vec<Part>) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            role: "user".to_string(),
            parts,
        }],
        generation_config: GenerationConfig {
            temperature: 0.2,
            response_mime_type: "application/json",
        },
    }
}

/// Concatenate the text parts of the first candidate.
fn extract_text(response: &GenerateContentResponse) -> Option<String> {
    let parts = &response.candidates.as_ref()?.first()?.content.as_ref()?.parts;
    let text: Vec<&str> = parts.iter().filter_map(|p| p.text.as_deref()).collect();
    let joined = text.join("\n");
    if joined.trim().is_empty() {
        None
    } else {
        Some(joined)
    }
}

/// Models sometimes wrap JSON in a markdown fence even in JSON mode.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

fn decode_output<T: DeserializeOwned>(text: &str) -> Result<T, AiError> {
    serde_json::from_str(strip_code_fence(text))
        .map_err(|e| AiError::MalformedResponse(format!("model output does not match schema: {e}")))
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

/// Keep API error bodies short in user-facing messages.
fn truncate_error(body: &str) -> String {
    const MAX: usize = 200;
    let body = body.trim();
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}

// ── Client ─────────────────────────────────────────────────────────────────

pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
    max_retries: u32,
    backoff: Duration,
}

impl GeminiClient {
    pub fn new(api_key: String, config: &AiConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.backoff_ms.max(1)),
        }
    }

    fn endpoint(&self) -> String {
        let model = self.model.strip_prefix("models/").unwrap_or(&self.model);
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }

    /// Send `request`, retrying transient failures, and return the reply text.
    async fn generate(&self, request: &GenerateContentRequest) -> Result<String, AiError> {
        let url = self.endpoint();
        let mut attempt = 0;
        loop {
            let outcome = self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(request)
                .send()
                .await;

            let retry_reason = match outcome {
                Ok(response) if response.status().is_success() => {
                    let body: GenerateContentResponse = response.json().await.map_err(|e| {
                        AiError::MalformedResponse(format!("unreadable response body: {e}"))
                    })?;
                    return extract_text(&body).ok_or_else(|| {
                        AiError::MalformedResponse("model returned no text".to_string())
                    });
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    if !is_retryable_status(status) {
                        return Err(AiError::ServiceFailure(format!(
                            "Gemini API error ({status}): {}",
                            truncate_error(&body)
                        )));
                    }
                    format!("Gemini API error ({status}): {}", truncate_error(&body))
                }
                Err(e) => format!("request failed: {e}"),
            };

            if attempt >= self.max_retries {
                return Err(AiError::ServiceFailure(retry_reason));
            }
            let delay = self
                .backoff
                .saturating_mul(2u32.saturating_pow(attempt))
                .min(MAX_BACKOFF);
            warn!(attempt, ?delay, reason = %retry_reason, "retrying Gemini request");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

impl QrExtractor for GeminiClient {
    async fn extract_payment_details(&self, image: &ImageDataUri) -> Result<PaymentDetails, AiError> {
        debug!(mime = image.mime_type(), bytes = image.byte_len(), "extracting QR payment details");
        let request = build_request(vec![Part::text(QR_PROMPT), Part::image(image)]);
        let text = self.generate(&request).await?;
        let details: PaymentDetails = decode_output(&text)?;
        if details.recipient_address.trim().is_empty() {
            return Err(AiError::MalformedResponse(
                "no recipient address found in QR code".to_string(),
            ));
        }
        Ok(details)
    }

    fn backend_name(&self) -> &str {
        "gemini"
    }
}

impl InsightsAdvisor for GeminiClient {
    async fn spending_insights(&self, transactions: &[Transaction]) -> Result<SpendingInsights, AiError> {
        debug!(count = transactions.len(), "requesting spending insights");
        let history = serde_json::to_string(transactions)
            .map_err(|e| AiError::ServiceFailure(format!("could not encode transactions: {e}")))?;
        let request = build_request(vec![
            Part::text(INSIGHTS_PROMPT),
            Part::text(format!("Transactions:\n{history}")),
        ]);
        let text = self.generate(&request).await?;
        let insights: SpendingInsights = decode_output(&text)?;
        if insights.summary.trim().is_empty() {
            return Err(AiError::MalformedResponse("empty summary".to_string()));
        }
        Ok(insights)
    }
}
