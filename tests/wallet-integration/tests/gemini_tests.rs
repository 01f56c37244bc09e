//! The Gemini client against a scripted local endpoint.

use std::sync::Arc;

use axum::http::StatusCode;
use peerpay_common::ai::{AiError, ImageDataUri, InsightsAdvisor, QrExtractor};
use peerpay_common::dashboard::mock_transactions;
use peerpay_common::store::MemoryStore;
use peerpay_common::wallet::WalletState;
use peerpay_node::gemini::GeminiClient;
use peerpay_node::Advisor;
use peerpay_wallet_integration::fake_gemini::{model_reply, FakeGemini};
use peerpay_wallet_integration::{ai_config, TestNode, PNG_DATA_URI};
use serde_json::{json, Value};

const DETAILS: &str = r#"{"recipientAddress": "pp:merchant-42", "paymentAmount": 12.5}"#;

fn image() -> ImageDataUri {
    ImageDataUri::parse(PNG_DATA_URI).unwrap()
}

#[tokio::test]
async fn extracts_details_and_sends_inline_image() {
    let fake = FakeGemini::start(vec![(StatusCode::OK, model_reply(DETAILS))]).await;
    let client = GeminiClient::new("test-key".into(), &ai_config(&fake.base_url, 0));

    let details = client.extract_payment_details(&image()).await.unwrap();
    assert_eq!(details.recipient_address, "pp:merchant-42");
    assert_eq!(details.amount().unwrap().cents(), 1_250);

    assert_eq!(fake.api_keys_seen(), vec!["test-key".to_string()]);
    let request = fake.last_request().unwrap();
    assert_eq!(request["generationConfig"]["responseMimeType"], "application/json");
    let parts = request["contents"][0]["parts"].as_array().unwrap();
    assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
}

#[tokio::test]
async fn retries_transient_failures() {
    let fake = FakeGemini::start(vec![
        (StatusCode::SERVICE_UNAVAILABLE, "overloaded".into()),
        (StatusCode::TOO_MANY_REQUESTS, "slow down".into()),
        (StatusCode::OK, model_reply(DETAILS)),
    ])
    .await;
    let client = GeminiClient::new("test-key".into(), &ai_config(&fake.base_url, 2));

    let details = client.extract_payment_details(&image()).await.unwrap();
    assert_eq!(details.payment_amount, 12.5);
    assert_eq!(fake.hits(), 3);
}

#[tokio::test]
async fn gives_up_after_max_retries() {
    let fake = FakeGemini::start(vec![(StatusCode::INTERNAL_SERVER_ERROR, "boom".into())]).await;
    let client = GeminiClient::new("test-key".into(), &ai_config(&fake.base_url, 2));

    let err = client.extract_payment_details(&image()).await.unwrap_err();
    assert!(matches!(err, AiError::ServiceFailure(_)));
    assert_eq!(fake.hits(), 3);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let fake = FakeGemini::start(vec![(StatusCode::BAD_REQUEST, "bad key".into())]).await;
    let client = GeminiClient::new("test-key".into(), &ai_config(&fake.base_url, 3));

    let err = client.extract_payment_details(&image()).await.unwrap_err();
    assert!(matches!(err, AiError::ServiceFailure(ref msg) if msg.contains("400")));
    assert_eq!(fake.hits(), 1);
}

#[tokio::test]
async fn off_schema_output_is_malformed() {
    let fake = FakeGemini::start(vec![(
        StatusCode::OK,
        model_reply(r#"{"recipient": "someone"}"#),
    )])
    .await;
    let client = GeminiClient::new("test-key".into(), &ai_config(&fake.base_url, 0));

    let err = client.extract_payment_details(&image()).await.unwrap_err();
    assert!(matches!(err, AiError::MalformedResponse(_)));
}

#[tokio::test]
async fn insights_come_back_typed() {
    let reply = json!({
        "summary": "Mostly bills.",
        "insights": [{
            "title": "Utilities are high",
            "description": "Electricity dominated this month.",
            "tip": "Compare providers.",
            "category": "Utilities"
        }]
    });
    let fake = FakeGemini::start(vec![(
        StatusCode::OK,
        model_reply(&format!("```json\n{reply}\n```")),
    )])
    .await;
    let client = GeminiClient::new("test-key".into(), &ai_config(&fake.base_url, 0));

    let insights = client.spending_insights(&mock_transactions()).await.unwrap();
    assert_eq!(insights.summary, "Mostly bills.");
    assert_eq!(insights.insights.len(), 1);
    assert_eq!(insights.insights[0].category, "Utilities");
}

#[tokio::test]
async fn node_maps_model_failures_to_bad_gateway_and_leaves_wallet_alone() {
    let fake = FakeGemini::start(vec![(StatusCode::OK, model_reply("not json at all"))]).await;
    let advisor = Advisor::from_config(&ai_config(&fake.base_url, 0));
    let node = TestNode::start(Arc::new(MemoryStore::new()), advisor).await;

    let health: Value = node.get_json("/health").await;
    assert_eq!(health["aiBackend"], "gemini");

    let resp = node
        .post("/qr/extract", json!({"photoDataUri": PNG_DATA_URI}))
        .await;
    assert_eq!(resp.status(), 502);
    let wallet: WalletState = node.get_json("/wallet").await;
    assert_eq!(wallet, WalletState::seed());
}

#[tokio::test]
async fn invalid_image_never_reaches_the_model() {
    let fake = FakeGemini::start(vec![(StatusCode::OK, model_reply(DETAILS))]).await;
    let node = TestNode::start(
        Arc::new(MemoryStore::new()),
        Advisor::from_config(&ai_config(&fake.base_url, 0)),
    )
    .await;

    let resp = node
        .post("/qr/extract", json!({"photoDataUri": "data:image/bmp;base64,Qk0="}))
        .await;
    assert_eq!(resp.status(), 422);
    assert_eq!(fake.hits(), 0);
}

#[tokio::test]
async fn node_returns_extracted_details() {
    let fake = FakeGemini::start(vec![(StatusCode::OK, model_reply(DETAILS))]).await;
    let node = TestNode::start(
        Arc::new(MemoryStore::new()),
        Advisor::from_config(&ai_config(&fake.base_url, 0)),
    )
    .await;

    let resp = node
        .post("/qr/extract", json!({"photoDataUri": PNG_DATA_URI}))
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"recipientAddress": "pp:merchant-42", "paymentAmount": 12.5}));
}
