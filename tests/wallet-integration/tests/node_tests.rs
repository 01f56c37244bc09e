//! HTTP round trips against a node on an ephemeral port.

use std::sync::Arc;

use peerpay_common::offline_advisor::OfflineAdvisor;
use peerpay_common::rewards::{RewardHistoryEntry, Voucher};
use peerpay_common::store::MemoryStore;
use peerpay_common::wallet::WalletState;
use peerpay_node::Advisor;
use peerpay_wallet_integration::{TestNode, PNG_DATA_URI};
use serde_json::{json, Value};

async fn offline_node() -> TestNode {
    TestNode::start(
        Arc::new(MemoryStore::new()),
        Advisor::Offline(OfflineAdvisor::new()),
    )
    .await
}

#[tokio::test]
async fn health_reports_backend() {
    let node = offline_node().await;
    let health: Value = node.get_json("/health").await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["aiBackend"], "offline");
}

#[tokio::test]
async fn fresh_wallet_is_the_seed() {
    let node = offline_node().await;
    let wallet: WalletState = node.get_json("/wallet").await;
    assert_eq!(wallet, WalletState::seed());

    let raw: Value = node.get_json("/wallet").await;
    assert_eq!(raw, json!({"balance": 2342.78, "rewardsPoints": 0, "currency": "USD"}));
}

#[tokio::test]
async fn bill_payment_then_redeem() {
    let node = offline_node().await;

    let resp = node
        .post("/payments", json!({"amount": 50, "category": "bill"}))
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["wallet"]["balance"], json!(2292.78));
    assert_eq!(body["wallet"]["rewardsPoints"], json!(5));
    assert_eq!(body["pointsEarned"], json!(5));

    let resp = node.post("/rewards/redeem", json!({"voucherId": "v-coffee"})).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["wallet"]["rewardsPoints"], json!(0));
    assert_eq!(body["voucher"]["redemptionCode"], "PPCOFFEE5");

    let resp = node.post("/rewards/redeem", json!({"voucherId": "v-coffee"})).await;
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["required"], json!(5));
    assert_eq!(body["available"], json!(0));
    assert!(body["error"].as_str().unwrap().contains("insufficient points"));

    let history: Vec<RewardHistoryEntry> = node.get_json("/rewards/history").await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].points_delta, -5);
    assert_eq!(history[1].points_delta, 5);
}

#[tokio::test]
async fn text_amounts_are_parsed() {
    let node = offline_node().await;
    let resp = node
        .post("/payments", json!({"amount": "$1,000.50", "category": "topup"}))
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["wallet"]["balance"], json!(1342.28));
    assert_eq!(body["pointsEarned"], json!(0));
}

#[tokio::test]
async fn invalid_amounts_are_rejected_without_touching_the_wallet() {
    let node = offline_node().await;
    for amount in [json!(0), json!(-5), json!("abc"), json!("1.234"), json!("")] {
        let resp = node
            .post("/payments", json!({"amount": amount, "category": "bill"}))
            .await;
        assert_eq!(resp.status(), 400, "amount {amount} should be rejected");
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().starts_with("invalid amount"));
    }
    let wallet: WalletState = node.get_json("/wallet").await;
    assert_eq!(wallet, WalletState::seed());
}

#[tokio::test]
async fn unknown_voucher_is_not_found() {
    let node = offline_node().await;
    let resp = node.post("/rewards/redeem", json!({"voucherId": "v-yacht"})).await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn catalog_and_dashboard_data() {
    let node = offline_node().await;
    let vouchers: Vec<Voucher> = node.get_json("/rewards/vouchers").await;
    assert_eq!(vouchers.len(), 4);
    assert!(vouchers.windows(2).all(|w| w[0].points_cost <= w[1].points_cost));

    let transactions: Vec<Value> = node.get_json("/transactions").await;
    assert_eq!(transactions.len(), 10);
    let cards: Vec<Value> = node.get_json("/cards").await;
    assert!(!cards.is_empty());
    let billers: Vec<Value> = node.get_json("/billers").await;
    assert!(!billers.is_empty());
    let profile: Value = node.get_json("/profile").await;
    assert!(profile.is_object());
}

#[tokio::test]
async fn offline_insights_use_mock_history_by_default() {
    let node = offline_node().await;
    let resp = node.post("/insights", json!({})).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["insights"].as_array().unwrap().len(), 3);
    assert_eq!(body["insights"][0]["category"], "Utilities");
}

#[tokio::test]
async fn qr_extraction_without_a_model_is_unavailable() {
    let node = offline_node().await;
    let resp = node
        .post("/qr/extract", json!({"photoDataUri": PNG_DATA_URI}))
        .await;
    assert_eq!(resp.status(), 503);
}

#[tokio::test]
async fn bad_images_are_unprocessable() {
    let node = offline_node().await;
    for uri in [
        "not a data uri",
        "data:application/pdf;base64,JVBERi0=",
        "data:image/png;base64,@@@@",
    ] {
        let resp = node.post("/qr/extract", json!({"photoDataUri": uri})).await;
        assert_eq!(resp.status(), 422, "{uri} should be rejected");
    }
}
