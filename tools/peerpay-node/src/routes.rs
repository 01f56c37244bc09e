//! HTTP API for the dashboard views.
//!
//! One ledger per process. Every open view that follows `/wallet/events`
//! gets the new state whenever any request changes the wallet.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tower_http::cors::{Any, CorsLayer};

use peerpay_common::ai::{
    AiError, ImageDataUri, InsightsAdvisor, PaymentDetails, QrExtractor, SpendingInsights,
};
use peerpay_common::amount::parse_amount;
use peerpay_common::currency::Money;
use peerpay_common::dashboard::{
    mock_billers, mock_cards, mock_profile, mock_transactions, Biller, Transaction, UserProfile,
    VirtualCard,
};
use peerpay_common::ledger::{LedgerError, WalletLedger};
use peerpay_common::rewards::{voucher_catalog, RewardHistoryEntry, Voucher};
use peerpay_common::store::DurableStore;
use peerpay_common::wallet::{PaymentCategory, WalletState};

use crate::advisor::Advisor;

pub struct AppState {
    pub ledger: WalletLedger,
    pub advisor: Advisor,
    pub vouchers: Vec<Voucher>,
}

impl AppState {
    pub fn new(store: Arc<dyn DurableStore>, advisor: Advisor) -> Self {
        Self {
            ledger: WalletLedger::new(store),
            advisor,
            vouchers: voucher_catalog(),
        }
    }
}

// ─── API types ───────────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<u64>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            ..Default::default()
        }),
    )
}

fn ledger_error(e: LedgerError) -> ApiError {
    match e {
        LedgerError::InvalidAmount(_) => api_error(StatusCode::BAD_REQUEST, e.to_string()),
        LedgerError::InsufficientPoints {
            required,
            available,
        } => (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: e.to_string(),
                required: Some(required),
                available: Some(available),
            }),
        ),
    }
}

fn ai_error(e: AiError) -> ApiError {
    let status = match e {
        AiError::InvalidImage(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AiError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
        AiError::ServiceFailure(_) | AiError::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
    };
    if status != StatusCode::UNPROCESSABLE_ENTITY {
        tracing::error!(error = %e, "AI request failed");
    }
    api_error(status, e.to_string())
}

/// A payment amount as sent by a form: either a JSON number or the raw text.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum AmountInput {
    Number(f64),
    Text(String),
}

impl AmountInput {
    fn to_money(&self) -> Result<Money, LedgerError> {
        match self {
            AmountInput::Number(n) => Money::from_dollars(*n)
                .ok_or_else(|| LedgerError::InvalidAmount(format!("amount {n} is out of range"))),
            AmountInput::Text(text) => parse_amount(text),
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct PaymentRequest {
    pub amount: AmountInput,
    pub category: PaymentCategory,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub wallet: WalletState,
    pub points_earned: u64,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RedeemRequest {
    pub voucher_id: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RedeemResponse {
    pub wallet: WalletState,
    pub voucher: Voucher,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct QrExtractRequest {
    pub photo_data_uri: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct InsightsRequest {
    #[serde(default)]
    pub transactions: Option<Vec<Transaction>>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub ai_backend: String,
}

// ─── Wallet ──────────────────────────────────────────────────────────────────

async fn wallet_handler(State(state): State<Arc<AppState>>) -> Json<WalletState> {
    Json(state.ledger.load_current_state())
}

/// Each frame re-reads the wallet when it is sent, so the last frame a view
/// gets is never older than the last write, however a write interleaves with
/// the stream opening.
async fn wallet_events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::unbounded_channel::<()>();
    let changed = tx.clone();
    let subscription = state.ledger.subscribe(move |_| {
        let _ = changed.send(());
    });
    // The opening frame; sent after subscribing so no write falls in between.
    let _ = tx.send(());

    let stream = UnboundedReceiverStream::new(rx).map(move |()| {
        // The stream owns the subscription; it is dropped when the client disconnects.
        let _keep = &subscription;
        let wallet = state.ledger.load_current_state();
        let event = Event::default()
            .event("wallet")
            .json_data(wallet)
            .unwrap_or_else(|_| Event::default().event("wallet").data("{}"));
        Ok(event)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn payment_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PaymentRequest>,
) -> ApiResult<PaymentResponse> {
    let amount = req.amount.to_money().map_err(ledger_error)?;
    let wallet = state
        .ledger
        .apply_payment(amount, req.category)
        .map_err(ledger_error)?;
    Ok(Json(PaymentResponse {
        wallet,
        points_earned: req.category.points_for(amount),
    }))
}

// ─── Rewards ─────────────────────────────────────────────────────────────────

async fn vouchers_handler(State(state): State<Arc<AppState>>) -> Json<Vec<Voucher>> {
    Json(state.vouchers.clone())
}

async fn redeem_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RedeemRequest>,
) -> ApiResult<RedeemResponse> {
    let voucher = state
        .vouchers
        .iter()
        .find(|v| v.id == req.voucher_id)
        .cloned()
        .ok_or_else(|| {
            api_error(
                StatusCode::NOT_FOUND,
                format!("unknown voucher {:?}", req.voucher_id),
            )
        })?;
    let wallet = state.ledger.redeem_voucher(&voucher).map_err(ledger_error)?;
    Ok(Json(RedeemResponse { wallet, voucher }))
}

async fn reward_history_handler(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<RewardHistoryEntry>> {
    Json(state.ledger.history())
}

// ─── Dashboard data ──────────────────────────────────────────────────────────

async fn transactions_handler() -> Json<Vec<Transaction>> {
    Json(mock_transactions())
}

async fn cards_handler() -> Json<Vec<VirtualCard>> {
    Json(mock_cards())
}

async fn billers_handler() -> Json<Vec<Biller>> {
    Json(mock_billers())
}

async fn profile_handler() -> Json<UserProfile> {
    Json(mock_profile())
}

// ─── AI ──────────────────────────────────────────────────────────────────────

async fn qr_extract_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QrExtractRequest>,
) -> ApiResult<PaymentDetails> {
    let image = ImageDataUri::parse(&req.photo_data_uri).map_err(ai_error)?;
    let details = state
        .advisor
        .extract_payment_details(&image)
        .await
        .map_err(ai_error)?;
    Ok(Json(details))
}

async fn insights_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InsightsRequest>,
) -> ApiResult<SpendingInsights> {
    let transactions = req.transactions.unwrap_or_else(mock_transactions);
    let insights = state
        .advisor
        .spending_insights(&transactions)
        .await
        .map_err(ai_error)?;
    Ok(Json(insights))
}

// ─── Health ──────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        ai_backend: state.advisor.backend_name().to_string(),
    })
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/wallet", get(wallet_handler))
        .route("/wallet/events", get(wallet_events_handler))
        .route("/payments", post(payment_handler))
        .route("/rewards/vouchers", get(vouchers_handler))
        .route("/rewards/redeem", post(redeem_handler))
        .route("/rewards/history", get(reward_history_handler))
        .route("/transactions", get(transactions_handler))
        .route("/cards", get(cards_handler))
        .route("/billers", get(billers_handler))
        .route("/profile", get(profile_handler))
        .route("/qr/extract", post(qr_extract_handler))
        .route("/insights", post(insights_handler))
        .layer(cors)
        .with_state(state)
}
