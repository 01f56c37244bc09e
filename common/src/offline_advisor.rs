use std::collections::BTreeMap;

use crate::ai::{AiError, ImageDataUri, Insight, InsightsAdvisor, PaymentDetails, QrExtractor, SpendingInsights};
use crate::currency::{format_amount, Currency, Money};
use crate::dashboard::Transaction;

/// Local stand-in for the model-backed services, used when no model is configured.
///
/// Insights are computed from per-category totals. QR extraction needs a
/// vision model, so it always reports [`AiError::NotConfigured`].
#[derive(Clone, Debug, Default)]
pub struct OfflineAdvisor;

impl OfflineAdvisor {
    pub fn new() -> Self {
        Self
    }
}

fn tip_for(category: &str) -> &'static str {
    match category {
        "Food" => "Plan meals for the week and set a dining-out budget.",
        "Utilities" => "Compare providers once a year and turn on autopay discounts.",
        "Entertainment" => "Review subscriptions you haven't used in the last month.",
        "Transport" => "Batch errands or try public transport for regular trips.",
        "Shopping" => "Wait 48 hours before non-essential purchases.",
        _ => "Set a monthly limit for this category and track it weekly.",
    }
}

impl QrExtractor for OfflineAdvisor {
    async fn extract_payment_details(&self, _image: &ImageDataUri) -> Result<PaymentDetails, AiError> {
        Err(AiError::NotConfigured(
            "QR extraction needs a model API key".to_string(),
        ))
    }

    fn backend_name(&self) -> &str {
        "offline"
    }
}

impl InsightsAdvisor for OfflineAdvisor {
    async fn spending_insights(&self, transactions: &[Transaction]) -> Result<SpendingInsights, AiError> {
        let mut by_category: BTreeMap<&str, Money> = BTreeMap::new();
        for tx in transactions.iter().filter(|t| t.is_spend()) {
            let spent = by_category.entry(tx.category.as_str()).or_default();
            *spent = *spent - tx.amount;
        }

        let total = by_category.values().fold(Money::ZERO, |acc, m| acc + *m);
        if by_category.is_empty() {
            return Ok(SpendingInsights {
                summary: "No spending recorded yet.".to_string(),
                insights: Vec::new(),
            });
        }

        let mut ranked: Vec<(&str, Money)> = by_category.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

        let usd = Currency::Usd;
        let (top, top_spent) = ranked[0];
        let summary = format!(
            "You spent {} across {} categories. {} was the largest at {}.",
            format_amount(total, &usd),
            ranked.len(),
            top,
            format_amount(top_spent, &usd)
        );

        let insights = ranked
            .iter()
            .take(3)
            .map(|(category, spent)| {
                let share = spent.cents() * 100 / total.cents().max(1);
                Insight {
                    title: format!("{category} spending"),
                    description: format!(
                        "{} on {category}, {share}% of your spending.",
                        format_amount(*spent, &usd)
                    ),
                    tip: tip_for(category).to_string(),
                    category: category.to_string(),
                }
            })
            .collect();

        Ok(SpendingInsights { summary, insights })
    }
}
