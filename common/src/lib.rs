pub mod ai;
pub mod amount;
pub mod currency;
pub mod dashboard;
pub mod ledger;
pub mod notify;
pub mod offline_advisor;
pub mod rewards;
pub mod store;
pub mod wallet;
