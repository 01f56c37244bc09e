use std::collections::VecDeque;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A catalog item redeemable for rewards points.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voucher {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Always positive.
    pub points_cost: u64,
    pub redemption_code: String,
}

/// One points-affecting event, kept for the rewards audit trail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardHistoryEntry {
    /// Format: "{prefix}:{timestamp_millis}:{random}"
    pub id: String,
    pub activity: String,
    /// ISO 8601, UTC.
    pub timestamp: String,
    pub points_delta: i64,
}

impl RewardHistoryEntry {
    pub fn new(activity: impl Into<String>, points_delta: i64, at: DateTime<Utc>) -> Self {
        Self {
            id: generate_ref("reward", at),
            activity: activity.into(),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            points_delta,
        }
    }
}

/// Build a reference id of the form "{prefix}:{timestamp_millis}:{random}".
pub fn generate_ref(prefix: &str, at: DateTime<Utc>) -> String {
    let nonce: u32 = rand::random();
    format!("{prefix}:{}:{nonce:08x}", at.timestamp_millis())
}

/// Entries kept per context; older ones are dropped first.
pub const HISTORY_CAPACITY: usize = 500;

/// Append-only log of points mutations for one context, bounded by
/// [`HISTORY_CAPACITY`].
///
/// Newest entries are returned first, which is how the rewards page lists them.
#[derive(Clone, Debug, Default)]
pub struct RewardHistory {
    entries: VecDeque<RewardHistoryEntry>,
}

impl RewardHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: RewardHistoryEntry) {
        if self.entries.len() == HISTORY_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn newest_first(&self) -> Vec<RewardHistoryEntry> {
        self.entries.iter().rev().cloned().collect()
    }
}

/// The static voucher catalog shown on the rewards page.
pub fn voucher_catalog() -> Vec<Voucher> {
    let entry = |id: &str, title: &str, description: &str, points_cost: u64, code: &str| Voucher {
        id: id.into(),
        title: title.into(),
        description: description.into(),
        points_cost,
        redemption_code: code.into(),
    };
    vec![
        entry(
            "v-coffee",
            "Free coffee",
            "One regular coffee at any partner cafe.",
            5,
            "PPCOFFEE5",
        ),
        entry(
            "v-movie",
            "Movie ticket",
            "A standard 2D ticket at participating cinemas.",
            25,
            "PPMOVIE25",
        ),
        entry(
            "v-grocery",
            "$10 grocery credit",
            "Ten dollars off a grocery order of $50 or more.",
            50,
            "PPGROC50",
        ),
        entry(
            "v-streaming",
            "One month of streaming",
            "A one-month voucher for a partner streaming service.",
            120,
            "PPSTREAM120",
        ),
    ]
}

/// Look up a voucher in the catalog.
pub fn find_voucher(id: &str) -> Option<Voucher> {
    voucher_catalog().into_iter().find(|v| v.id == id)
}
