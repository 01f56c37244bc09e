//! `/wallet/events` delivers every wallet change to every open view.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use peerpay_common::currency::{Currency, Money};
use peerpay_common::ledger::WalletLedger;
use peerpay_common::notify::Subscription;
use peerpay_common::offline_advisor::OfflineAdvisor;
use peerpay_common::store::{DurableStore, MemoryStore, StorageEvent, StoreError};
use peerpay_common::wallet::{PaymentCategory, WalletState, WALLET_KEY};
use peerpay_node::Advisor;
use peerpay_wallet_integration::TestNode;
use serde_json::json;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stream_opens_with_current_state() {
    let node = TestNode::start(
        Arc::new(MemoryStore::new()),
        Advisor::Offline(OfflineAdvisor::new()),
    )
    .await;
    let mut events = node.wallet_events().await;
    assert_eq!(events.next().await, Some(WalletState::seed()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn two_views_both_see_a_payment() {
    let node = TestNode::start(
        Arc::new(MemoryStore::new()),
        Advisor::Offline(OfflineAdvisor::new()),
    )
    .await;
    let mut view_a = node.wallet_events().await;
    let mut view_b = node.wallet_events().await;
    view_a.next().await.unwrap();
    view_b.next().await.unwrap();

    let resp = node
        .post("/payments", json!({"amount": 25, "category": "bill"}))
        .await;
    assert_eq!(resp.status(), 200);

    let a = view_a.next().await.expect("view A got no update");
    let b = view_b.next().await.expect("view B got no update");
    assert_eq!(a, b);
    assert_eq!(a.balance, Money::from_cents(231_778));
    assert_eq!(a.rewards_points, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn write_from_another_context_is_streamed() {
    let store = MemoryStore::new();
    let node = TestNode::start(
        Arc::new(store.clone()),
        Advisor::Offline(OfflineAdvisor::new()),
    )
    .await;
    let mut events = node.wallet_events().await;
    events.next().await.unwrap();

    let other_tab = WalletLedger::new(Arc::new(store));
    let written = other_tab
        .apply_payment(Money::from_cents(999), PaymentCategory::Bill)
        .unwrap();

    assert_eq!(events.next().await, Some(written));
    assert_eq!(written.rewards_points, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn refused_redeem_sends_nothing() {
    let node = TestNode::start(
        Arc::new(MemoryStore::new()),
        Advisor::Offline(OfflineAdvisor::new()),
    )
    .await;
    let mut events = node.wallet_events().await;
    events.next().await.unwrap();

    let resp = node.post("/rewards/redeem", json!({"voucherId": "v-coffee"})).await;
    assert_eq!(resp.status(), 409);
    let resp = node
        .post("/payments", json!({"amount": 10, "category": "topup"}))
        .await;
    assert_eq!(resp.status(), 200);

    // The first frame after the refusal is the top-up, not a redeem.
    let next = events.next().await.unwrap();
    assert_eq!(next.balance, Money::from_cents(233_278));
    assert_eq!(next.rewards_points, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn closed_stream_releases_its_listener() {
    let node = TestNode::start(
        Arc::new(MemoryStore::new()),
        Advisor::Offline(OfflineAdvisor::new()),
    )
    .await;
    {
        let mut events = node.wallet_events().await;
        events.next().await.unwrap();
    }

    // Writes after the client went away must not fail or block.
    for _ in 0..3 {
        let resp = node
            .post("/payments", json!({"amount": 1, "category": "qr"}))
            .await;
        assert_eq!(resp.status(), 200);
    }
    assert_eq!(
        node.state.ledger.load_current_state().balance,
        Money::from_cents(234_278 - 300)
    );
}

/// Lets another writer commit right after the next wallet read returns,
/// before the reader has done anything with the value.
struct WriteAfterRead {
    inner: MemoryStore,
    armed: AtomicBool,
    next: WalletState,
}

impl DurableStore for WriteAfterRead {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self.inner.get(key)?;
        if key == WALLET_KEY && self.armed.swap(false, Ordering::SeqCst) {
            self.inner.set(WALLET_KEY, &self.next.to_stored()?)?;
        }
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.set(key, value)
    }

    fn watch(&self, listener: Box<dyn Fn(&StorageEvent) + Send + Sync>) -> Subscription {
        self.inner.watch(listener)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn write_landing_while_stream_opens_is_delivered() {
    let next = WalletState {
        balance: Money::from_cents(100_000),
        rewards_points: 3,
        currency: Currency::Usd,
    };
    let store = Arc::new(WriteAfterRead {
        inner: MemoryStore::new(),
        armed: AtomicBool::new(true),
        next,
    });
    let node = TestNode::start(store, Advisor::Offline(OfflineAdvisor::new())).await;

    let mut events = node.wallet_events().await;
    assert_eq!(events.next().await, Some(WalletState::seed()));
    assert_eq!(events.next().await, Some(next));
}
