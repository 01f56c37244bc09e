//! The wallet ledger: sole mutator of a session's [`WalletState`].
//!
//! Every operation follows the same path: re-read the store, apply a pure
//! transition, write the result back under [`WALLET_KEY`]. Subscribers hear
//! about changes through the store's change signal, so a write made by any
//! ledger sharing the store reaches every ledger's subscribers.
//!
//! Cross-context writes are last-writer-wins. There is no versioning.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::currency::Money;
use crate::notify::{Listeners, Subscription};
use crate::rewards::{RewardHistory, RewardHistoryEntry, Voucher};
use crate::store::{DurableStore, StorageEvent, StoreError};
use crate::wallet::{InsufficientPoints, PaymentCategory, WalletState, WALLET_KEY};

/// Errors from ledger operations. None of them leave the wallet half-updated.
///
/// Store failures are not in here: they are logged and absorbed (see
/// [`WalletLedger::load_current_state`] and the write path).
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("insufficient points: need {required}, have {available}")]
    InsufficientPoints { required: u64, available: u64 },
}

impl From<InsufficientPoints> for LedgerError {
    fn from(e: InsufficientPoints) -> Self {
        LedgerError::InsufficientPoints {
            required: e.required,
            available: e.available,
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Decode a stored wallet, falling back to `seed` when the entry is unusable.
fn decode_wallet(raw: &str, seed: &WalletState) -> WalletState {
    match WalletState::from_stored(raw, seed) {
        Ok(stored) => {
            if !stored.defaulted.is_empty() {
                debug!(fields = ?stored.defaulted, "stored wallet missing fields, using seed values");
            }
            stored.state
        }
        Err(e) => {
            warn!(error = %e, "stored wallet unparseable, falling back to seed");
            *seed
        }
    }
}

/// One context's view of the session wallet.
pub struct WalletLedger {
    store: Arc<dyn DurableStore>,
    seed: WalletState,
    /// Fallback for when the store can't be read or is behind this context.
    last_known: Arc<Mutex<WalletState>>,
    /// Set when `last_known` holds a state the store failed to take. Cleared
    /// by the next successful write from any context.
    unsaved: Arc<AtomicBool>,
    history: Mutex<RewardHistory>,
    listeners: Listeners<WalletState>,
    /// Serializes read-transition-write within this context.
    write_lock: Mutex<()>,
    _store_watch: Subscription,
}

impl WalletLedger {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self::with_seed(store, WalletState::seed())
    }

    pub fn with_seed(store: Arc<dyn DurableStore>, seed: WalletState) -> Self {
        let listeners = Listeners::new();
        let last_known = Arc::new(Mutex::new(seed));
        let unsaved = Arc::new(AtomicBool::new(false));

        let watch_listeners = listeners.clone();
        let watch_last_known = Arc::clone(&last_known);
        let watch_unsaved = Arc::clone(&unsaved);
        let store_watch = store.watch(Box::new(move |event: &StorageEvent| {
            if event.key != WALLET_KEY {
                return;
            }
            let state = decode_wallet(&event.new_value, &seed);
            *lock(&watch_last_known) = state;
            watch_unsaved.store(false, Ordering::SeqCst);
            watch_listeners.dispatch(&state);
        }));

        Self {
            store,
            seed,
            last_known,
            unsaved,
            history: Mutex::new(RewardHistory::new()),
            listeners,
            write_lock: Mutex::new(()),
            _store_watch: store_watch,
        }
    }

    pub fn seed(&self) -> WalletState {
        self.seed
    }

    /// Read the wallet from the store.
    ///
    /// An absent or unparseable entry yields the seed; a failed read yields the
    /// last state this context saw. Neither is reported as an error.
    ///
    /// After a failed write the store is behind this context, so the in-memory
    /// state wins until a write succeeds. Outside a mutation the unsaved state
    /// is written again here.
    pub fn load_current_state(&self) -> WalletState {
        if self.unsaved.load(Ordering::SeqCst) {
            // A mutation in flight holds the lock and will write a newer state itself.
            let Ok(_guard) = self.write_lock.try_lock() else {
                return *lock(&self.last_known);
            };
            if self.unsaved.load(Ordering::SeqCst) {
                let state = *lock(&self.last_known);
                match self.persist(state) {
                    Ok(()) => info!(balance = %state.balance, "unsaved wallet written"),
                    Err(e) => debug!(error = %e, "wallet still unsaved, using in-memory state"),
                }
                return state;
            }
        }
        match self.store.get(WALLET_KEY) {
            Ok(Some(raw)) => {
                let state = decode_wallet(&raw, &self.seed);
                *lock(&self.last_known) = state;
                state
            }
            Ok(None) => {
                debug!("no stored wallet, using seed");
                self.seed
            }
            Err(e) => {
                let fallback = *lock(&self.last_known);
                warn!(error = %e, "wallet read failed, using last known state");
                fallback
            }
        }
    }

    /// Debit `amount` for a payment in `category`, crediting bill-pay points.
    ///
    /// `amount` must be positive. The balance itself has no floor.
    pub fn apply_payment(
        &self,
        amount: Money,
        category: PaymentCategory,
    ) -> Result<WalletState, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(format!(
                "payment amount must be positive, got {amount}"
            )));
        }

        let _guard = lock(&self.write_lock);
        let current = self.load_current_state();
        let (next, earned) = current.after_payment(amount, category);

        if earned > 0 {
            lock(&self.history).record(RewardHistoryEntry::new(
                format!("{} reward", category.label()),
                earned as i64,
                Utc::now(),
            ));
        }
        self.commit(next);

        info!(
            %amount,
            ?category,
            points_earned = earned,
            balance = %next.balance,
            "payment applied"
        );
        Ok(next)
    }

    /// Spend `voucher.points_cost` points.
    ///
    /// The points check and the debit see the same snapshot. On failure nothing
    /// is written and nobody is notified.
    pub fn redeem_voucher(&self, voucher: &Voucher) -> Result<WalletState, LedgerError> {
        if voucher.points_cost == 0 {
            return Err(LedgerError::InvalidAmount(format!(
                "voucher {} has no points cost",
                voucher.id
            )));
        }

        let _guard = lock(&self.write_lock);
        let current = self.load_current_state();
        let next = current.redeem(voucher).inspect_err(|e| {
            info!(
                voucher = %voucher.id,
                required = e.required,
                available = e.available,
                "redemption refused"
            );
        })?;

        lock(&self.history).record(RewardHistoryEntry::new(
            format!("Redeemed: {}", voucher.title),
            -(voucher.points_cost as i64),
            Utc::now(),
        ));
        self.commit(next);

        info!(
            voucher = %voucher.id,
            points_spent = voucher.points_cost,
            points_left = next.rewards_points,
            "voucher redeemed"
        );
        Ok(next)
    }

    /// Call `listener` with the new state whenever the stored wallet changes,
    /// whichever ledger wrote it.
    ///
    /// Listeners run on the writer's thread while it holds its write lock, so
    /// they must not call a mutating operation on the same ledger.
    #[must_use = "dropping the subscription unregisters the listener"]
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&WalletState) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    /// Points activity recorded by this context, newest first.
    pub fn history(&self) -> Vec<RewardHistoryEntry> {
        lock(&self.history).newest_first()
    }

    /// Persist `next`. A failed write is logged, `next` stays authoritative for
    /// this context until a write succeeds, and this context's subscribers get
    /// it directly since no store event will follow.
    fn commit(&self, next: WalletState) {
        *lock(&self.last_known) = next;
        if let Err(e) = self.persist(next) {
            warn!(error = %e, "wallet write failed, keeping in-memory state");
            self.unsaved.store(true, Ordering::SeqCst);
            self.listeners.dispatch(&next);
        }
    }

    fn persist(&self, state: WalletState) -> Result<(), StoreError> {
        let raw = state.to_stored()?;
        self.store.set(WALLET_KEY, &raw)?;
        self.unsaved.store(false, Ordering::SeqCst);
        Ok(())
    }
}
