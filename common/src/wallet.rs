use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::currency::{Currency, Money};
use crate::rewards::Voucher;

/// Store key holding the serialized wallet.
pub const WALLET_KEY: &str = "wallet";

/// Bill payments earn one point per whole `POINTS_UNIT` spent.
pub const POINTS_UNIT: Money = Money::from_cents(1_000);

/// Starting balance of a fresh session.
pub const SEED_BALANCE: Money = Money::from_cents(234_278);

/// Balance and rewards points for one user session.
///
/// Only ever changed through [`crate::ledger::WalletLedger`]; the transition
/// methods here are pure and return a new value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletState {
    /// May go negative: there is no overdraft floor.
    pub balance: Money,
    pub rewards_points: u64,
    pub currency: Currency,
}

/// Payment type tag controlling points earning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentCategory {
    Bill,
    Topup,
    Subscription,
    Qr,
}

impl PaymentCategory {
    pub fn all() -> &'static [PaymentCategory] {
        &[
            PaymentCategory::Bill,
            PaymentCategory::Topup,
            PaymentCategory::Subscription,
            PaymentCategory::Qr,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentCategory::Bill => "Bill payment",
            PaymentCategory::Topup => "Mobile top-up",
            PaymentCategory::Subscription => "Subscription",
            PaymentCategory::Qr => "QR payment",
        }
    }

    /// Points earned for spending `amount` in this category.
    pub fn points_for(&self, amount: Money) -> u64 {
        match self {
            PaymentCategory::Bill => amount.whole_units_of(POINTS_UNIT),
            PaymentCategory::Topup | PaymentCategory::Subscription | PaymentCategory::Qr => 0,
        }
    }
}

/// Redemption precondition failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InsufficientPoints {
    pub required: u64,
    pub available: u64,
}

impl Default for WalletState {
    fn default() -> Self {
        Self::seed()
    }
}

impl WalletState {
    /// The compiled-in starting snapshot.
    pub const fn seed() -> Self {
        Self {
            balance: SEED_BALANCE,
            rewards_points: 0,
            currency: Currency::Usd,
        }
    }

    /// State after paying `amount` in `category`, plus the points earned.
    ///
    /// The caller guarantees `amount` is positive.
    pub fn after_payment(&self, amount: Money, category: PaymentCategory) -> (WalletState, u64) {
        let earned = category.points_for(amount);
        let next = WalletState {
            balance: self.balance - amount,
            rewards_points: self.rewards_points.saturating_add(earned),
            currency: self.currency,
        };
        (next, earned)
    }

    /// State after spending `voucher.points_cost` points. Leaves `self` untouched.
    pub fn redeem(&self, voucher: &Voucher) -> Result<WalletState, InsufficientPoints> {
        let remaining = self
            .rewards_points
            .checked_sub(voucher.points_cost)
            .ok_or(InsufficientPoints {
                required: voucher.points_cost,
                available: self.rewards_points,
            })?;
        Ok(WalletState {
            rewards_points: remaining,
            ..*self
        })
    }

    /// Serialize to the flat stored shape
    /// `{"balance": number, "rewardsPoints": number, "currency": string}`.
    pub fn to_stored(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Rebuild from the stored shape. Missing or invalid fields take the
    /// value from `fallback`; anything that is not a JSON object is an error.
    pub fn from_stored(raw: &str, fallback: &WalletState) -> Result<StoredWallet, serde_json::Error> {
        let value: Value = serde_json::from_str(raw)?;
        let Value::Object(fields) = value else {
            return Err(serde::de::Error::custom("wallet entry is not an object"));
        };

        let mut defaulted = Vec::new();

        let balance = fields
            .get("balance")
            .and_then(Value::as_f64)
            .and_then(Money::from_dollars);
        let rewards_points = fields.get("rewardsPoints").and_then(Value::as_u64);
        let currency = fields
            .get("currency")
            .and_then(Value::as_str)
            .and_then(Currency::from_code);

        if balance.is_none() {
            defaulted.push("balance");
        }
        if rewards_points.is_none() {
            defaulted.push("rewardsPoints");
        }
        // Currency is fixed for the life of the state; a foreign code is ignored.
        if currency != Some(fallback.currency) {
            defaulted.push("currency");
        }

        Ok(StoredWallet {
            state: WalletState {
                balance: balance.unwrap_or(fallback.balance),
                rewards_points: rewards_points.unwrap_or(fallback.rewards_points),
                currency: fallback.currency,
            },
            defaulted,
        })
    }
}

/// A wallet decoded from the store, with the names of fields that fell back.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredWallet {
    pub state: WalletState,
    pub defaulted: Vec<&'static str>,
}
