//! Shopify webhook handlers.

use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::instrument;

use crate::error::AppError;
use crate::middleware::VerifiedWebhook;
use crate::state::AppState;

/// POST /webhooks/app/uninstalled - Forget an uninstalled store.
///
/// The signature is verified by the extractor before anything is deleted.
/// Deleting a store that is already gone still acknowledges the webhook so
/// Shopify stops retrying.
#[instrument(skip_all, fields(shop = %webhook.shop))]
pub async fn app_uninstalled(
    State(state): State<AppState>,
    webhook: VerifiedWebhook,
) -> Result<StatusCode, AppError> {
    if forget_store(&state, &webhook).await? {
        tracing::info!("Store uninstalled");
    } else {
        tracing::info!("Uninstall webhook for unknown store");
    }

    Ok(StatusCode::OK)
}

/// Mandatory privacy topics delivered to the compliance endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplianceTopic {
    /// `customers/data_request`
    CustomersDataRequest,
    /// `customers/redact`
    CustomersRedact,
    /// `shop/redact`, sent 48 hours after uninstall.
    ShopRedact,
}

impl ComplianceTopic {
    /// Parse an `X-Shopify-Topic` value.
    #[must_use]
    pub fn from_topic(topic: &str) -> Option<Self> {
        match topic {
            "customers/data_request" => Some(Self::CustomersDataRequest),
            "customers/redact" => Some(Self::CustomersRedact),
            "shop/redact" => Some(Self::ShopRedact),
            _ => None,
        }
    }
}

/// The parts of a compliance payload worth logging.
#[derive(Debug, Default, Deserialize)]
struct CompliancePayload {
    shop_id: Option<u64>,
    customer: Option<CustomerRef>,
}

#[derive(Debug, Deserialize)]
struct CustomerRef {
    id: Option<u64>,
}

/// POST /webhooks/compliance_webhooks - Privacy requests.
///
/// No customer data is stored, so the customer topics are acknowledged
/// as-is. `shop/redact` removes the store's credential. Unknown topics are
/// logged and acknowledged.
#[instrument(skip_all, fields(shop = %webhook.shop, topic = webhook.topic.as_deref().unwrap_or("")))]
pub async fn compliance(
    State(state): State<AppState>,
    webhook: VerifiedWebhook,
) -> Result<StatusCode, AppError> {
    let payload: CompliancePayload = serde_json::from_slice(&webhook.body).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Unreadable compliance payload");
        CompliancePayload::default()
    });
    let customer_id = payload.customer.and_then(|c| c.id);

    match webhook.topic.as_deref().and_then(ComplianceTopic::from_topic) {
        Some(ComplianceTopic::CustomersDataRequest) => {
            tracing::info!(?customer_id, "Customer data request: no customer data held");
        }
        Some(ComplianceTopic::CustomersRedact) => {
            tracing::info!(?customer_id, "Customer redact: no customer data held");
        }
        Some(ComplianceTopic::ShopRedact) => {
            let removed = forget_store(&state, &webhook).await?;
            tracing::info!(shop_id = ?payload.shop_id, removed, "Shop redacted");
        }
        None => {
            tracing::warn!("Unknown compliance topic");
        }
    }

    Ok(StatusCode::OK)
}

/// Delete the webhook's store and drop its cached session.
async fn forget_store(state: &AppState, webhook: &VerifiedWebhook) -> Result<bool, AppError> {
    let removed = state.directory().delete_by_domain(&webhook.shop).await?;
    state.stores().invalidate(&webhook.shop).await;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compliance_topics() {
        assert_eq!(
            ComplianceTopic::from_topic("customers/data_request"),
            Some(ComplianceTopic::CustomersDataRequest)
        );
        assert_eq!(
            ComplianceTopic::from_topic("customers/redact"),
            Some(ComplianceTopic::CustomersRedact)
        );
        assert_eq!(
            ComplianceTopic::from_topic("shop/redact"),
            Some(ComplianceTopic::ShopRedact)
        );
        assert_eq!(ComplianceTopic::from_topic("app/uninstalled"), None);
    }
}
