//! Read-only mock data backing the dashboard pages.
//!
//! Nothing here is persisted; only the wallet goes through the store.

use serde::{Deserialize, Serialize};

use crate::currency::Money;
use crate::wallet::PaymentCategory;

/// A single entry in the transaction history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub counterparty: String,
    pub description: String,
    /// Negative for money leaving the wallet.
    pub amount: Money,
    pub kind: TransactionKind,
    /// Spending bucket used by the insights page (e.g. "Food", "Utilities").
    pub category: String,
    /// ISO 8601 date.
    pub date: String,
    pub status: TransactionStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Credit,
    Debit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Completed,
    Pending,
    Failed,
}

impl Transaction {
    pub fn is_spend(&self) -> bool {
        self.kind == TransactionKind::Debit && self.status != TransactionStatus::Failed
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardNetwork {
    Visa,
    Mastercard,
}

/// A virtual card attached to the wallet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualCard {
    pub id: String,
    pub label: String,
    pub last4: String,
    pub network: CardNetwork,
    /// "MM/YY"
    pub expiry: String,
    pub spending_limit: Money,
    pub frozen: bool,
}

impl VirtualCard {
    pub fn with_frozen(&self, frozen: bool) -> Self {
        Self {
            frozen,
            ..self.clone()
        }
    }
}

/// A payee offered on the bill, subscription and top-up forms.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Biller {
    pub id: String,
    pub name: String,
    pub category: PaymentCategory,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    NotStarted,
    Pending,
    Verified,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    pub kyc_status: KycStatus,
}

pub fn mock_profile() -> UserProfile {
    UserProfile {
        name: "Alex Morgan".into(),
        email: "alex.morgan@example.com".into(),
        kyc_status: KycStatus::Pending,
    }
}

pub fn mock_transactions() -> Vec<Transaction> {
    let tx = |id: &str,
              counterparty: &str,
              description: &str,
              cents: i64,
              category: &str,
              date: &str,
              status: TransactionStatus| Transaction {
        id: id.into(),
        counterparty: counterparty.into(),
        description: description.into(),
        amount: Money::from_cents(cents),
        kind: if cents < 0 {
            TransactionKind::Debit
        } else {
            TransactionKind::Credit
        },
        category: category.into(),
        date: date.into(),
        status,
    };
    use TransactionStatus::*;
    vec![
        tx("tx-1001", "Acme Corp", "Salary", 420_000, "Income", "2024-07-01", Completed),
        tx("tx-1002", "City Power", "Electricity bill", -8_950, "Utilities", "2024-07-02", Completed),
        tx("tx-1003", "Green Grocer", "Weekly groceries", -6_420, "Food", "2024-07-03", Completed),
        tx("tx-1004", "StreamFlix", "Monthly plan", -1_599, "Entertainment", "2024-07-05", Completed),
        tx("tx-1005", "Jordan Lee", "Dinner split", 3_500, "Transfers", "2024-07-06", Completed),
        tx("tx-1006", "Bean There", "Coffee", -475, "Food", "2024-07-08", Completed),
        tx("tx-1007", "MetroNet", "Internet bill", -5_999, "Utilities", "2024-07-09", Pending),
        tx("tx-1008", "RideNow", "Airport ride", -3_240, "Transport", "2024-07-10", Completed),
        tx("tx-1009", "Gadget Hub", "Headphones", -12_900, "Shopping", "2024-07-12", Failed),
        tx("tx-1010", "Bean There", "Coffee", -525, "Food", "2024-07-14", Completed),
    ]
}

pub fn mock_cards() -> Vec<VirtualCard> {
    vec![
        VirtualCard {
            id: "card-1".into(),
            label: "Everyday".into(),
            last4: "4821".into(),
            network: CardNetwork::Visa,
            expiry: "09/28".into(),
            spending_limit: Money::from_cents(200_000),
            frozen: false,
        },
        VirtualCard {
            id: "card-2".into(),
            label: "Subscriptions".into(),
            last4: "1177".into(),
            network: CardNetwork::Mastercard,
            expiry: "03/27".into(),
            spending_limit: Money::from_cents(15_000),
            frozen: true,
        },
    ]
}

pub fn mock_billers() -> Vec<Biller> {
    let biller = |id: &str, name: &str, category| Biller {
        id: id.into(),
        name: name.into(),
        category,
    };
    vec![
        biller("b-power", "City Power", PaymentCategory::Bill),
        biller("b-water", "Metro Water", PaymentCategory::Bill),
        biller("b-net", "MetroNet", PaymentCategory::Bill),
        biller("s-stream", "StreamFlix", PaymentCategory::Subscription),
        biller("s-music", "TuneBox", PaymentCategory::Subscription),
        biller("t-mobile", "Mobi Prepaid", PaymentCategory::Topup),
    ]
}
