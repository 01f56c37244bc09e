use peerpay_common::ai::{
    AiError, ImageDataUri, InsightsAdvisor, PaymentDetails, QrExtractor, SpendingInsights,
};
use peerpay_common::dashboard::Transaction;
use peerpay_common::offline_advisor::OfflineAdvisor;

use crate::config::AiConfig;
use crate::gemini::GeminiClient;

/// The model backend chosen at startup.
pub enum Advisor {
    Gemini(GeminiClient),
    Offline(OfflineAdvisor),
}

impl Advisor {
    /// Gemini when an API key is available, the offline advisor otherwise.
    pub fn from_config(config: &AiConfig) -> Self {
        match config.resolved_api_key() {
            Some(key) => Advisor::Gemini(GeminiClient::new(key, config)),
            None => {
                tracing::info!("no Gemini API key configured, using offline advisor");
                Advisor::Offline(OfflineAdvisor::new())
            }
        }
    }
}

impl QrExtractor for Advisor {
    async fn extract_payment_details(&self, image: &ImageDataUri) -> Result<PaymentDetails, AiError> {
        match self {
            Advisor::Gemini(client) => client.extract_payment_details(image).await,
            Advisor::Offline(offline) => offline.extract_payment_details(image).await,
        }
    }

    fn backend_name(&self) -> &str {
        match self {
            Advisor::Gemini(client) => client.backend_name(),
            Advisor::Offline(offline) => offline.backend_name(),
        }
    }
}

impl InsightsAdvisor for Advisor {
    async fn spending_insights(&self, transactions: &[Transaction]) -> Result<SpendingInsights, AiError> {
        match self {
            Advisor::Gemini(client) => client.spending_insights(transactions).await,
            Advisor::Offline(offline) => offline.spending_insights(transactions).await,
        }
    }
}
