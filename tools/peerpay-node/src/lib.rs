//! PeerPay node: serves the wallet ledger and the AI helpers over HTTP.

pub mod advisor;
pub mod config;
pub mod gemini;
pub mod routes;

pub use advisor::Advisor;
pub use config::{AiConfig, NodeConfig};
pub use routes::{build_router, AppState};
