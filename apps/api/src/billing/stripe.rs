//! Minimal Stripe REST client: Checkout Sessions and the billing portal.
//!
//! Stripe takes form-encoded bodies and returns JSON. One attempt per call.

use std::collections::HashMap;

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::billing::entitlement::Tier;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

#[derive(Debug, Error)]
pub enum StripeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Stripe API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("No Stripe price configured for tier {0}")]
    MissingPrice(Tier),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub customer: Option<String>,
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    pub fn is_paid(&self) -> bool {
        matches!(self.payment_status.as_deref(), Some("paid" | "no_payment_required"))
    }

    /// Buyer recorded at checkout creation.
    pub fn user_id(&self) -> Option<Uuid> {
        self.client_reference_id
            .as_deref()
            .or(self.metadata.get("user_id").map(String::as_str))
            .and_then(|id| Uuid::parse_str(id).ok())
    }

    pub fn tier(&self) -> Option<Tier> {
        self.metadata.get("tier").and_then(|t| t.parse().ok())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortalSession {
    pub url: String,
}

pub struct CheckoutRequest<'a> {
    pub price_id: &'a str,
    pub tier: Tier,
    pub user_id: Uuid,
    pub customer_id: Option<&'a str>,
    pub customer_email: Option<&'a str>,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    message: Option<String>,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
    base_url: String,
}

impl StripeClient {
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(20))
                .build()
                .expect("Failed to build HTTP client"),
            secret_key: secret_key.to_string(),
            base_url: STRIPE_API_BASE.to_string(),
        }
    }

    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest<'_>,
    ) -> Result<CheckoutSession, StripeError> {
        let form = checkout_form(request);
        self.post("checkout/sessions", &form).await
    }

    pub async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, StripeError> {
        let form = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("return_url".to_string(), return_url.to_string()),
        ];
        self.post("billing_portal/sessions", &form).await
    }

    pub async fn retrieve_checkout_session(&self, id: &str) -> Result<CheckoutSession, StripeError> {
        let response = self
            .client
            .get(format!("{}/checkout/sessions/{id}", self.base_url))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await?;
        parse_response(response).await
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, StripeError> {
        let response = self
            .client
            .post(format!("{}/{path}", self.base_url))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(form)
            .send()
            .await?;
        parse_response(response).await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, StripeError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .and_then(|e| {
                e.error
                    .message
                    .or(e.error.error_type)
            })
            .unwrap_or(body);
        return Err(StripeError::Api {
            status: status.as_u16(),
            message,
        });
    }
    debug!("Stripe call succeeded ({status})");
    Ok(response.json::<T>().await?)
}

/// Form fields for a one-off payment Checkout Session.
fn checkout_form(request: &CheckoutRequest<'_>) -> Vec<(String, String)> {
    let user_id = request.user_id.to_string();
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("line_items[0][price]".to_string(), request.price_id.to_string()),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        ("success_url".to_string(), request.success_url.to_string()),
        ("cancel_url".to_string(), request.cancel_url.to_string()),
        ("client_reference_id".to_string(), user_id.clone()),
        ("metadata[user_id]".to_string(), user_id),
        ("metadata[tier]".to_string(), request.tier.as_str().to_string()),
    ];
    match (request.customer_id, request.customer_email) {
        (Some(customer), _) => form.push(("customer".to_string(), customer.to_string())),
        (None, Some(email)) => {
            form.push(("customer_email".to_string(), email.to_string()));
            form.push(("customer_creation".to_string(), "always".to_string()));
        }
        (None, None) => form.push(("customer_creation".to_string(), "always".to_string())),
    }
    form
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_checkout_form_carries_user_and_tier() {
        let user_id = Uuid::new_v4();
        let form = checkout_form(&CheckoutRequest {
            price_id: "price_7",
            tier: Tier::SevenDay,
            user_id,
            customer_id: None,
            customer_email: Some("a@b.co"),
            success_url: "http://localhost:3000/ok",
            cancel_url: "http://localhost:3000/pricing",
        });
        assert_eq!(field(&form, "mode"), Some("payment"));
        assert_eq!(field(&form, "line_items[0][price]"), Some("price_7"));
        assert_eq!(field(&form, "metadata[tier]"), Some("7day"));
        assert_eq!(field(&form, "client_reference_id"), Some(user_id.to_string().as_str()));
        assert_eq!(field(&form, "customer_email"), Some("a@b.co"));
        assert_eq!(field(&form, "customer"), None);
    }

    #[test]
    fn test_existing_customer_is_reused() {
        let form = checkout_form(&CheckoutRequest {
            price_id: "price_2",
            tier: Tier::TwoDay,
            user_id: Uuid::new_v4(),
            customer_id: Some("cus_123"),
            customer_email: Some("a@b.co"),
            success_url: "s",
            cancel_url: "c",
        });
        assert_eq!(field(&form, "customer"), Some("cus_123"));
        assert_eq!(field(&form, "customer_email"), None);
    }

    #[test]
    fn test_checkout_session_accessors() {
        let user_id = Uuid::new_v4();
        let session: CheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs_test_1",
            "url": null,
            "status": "complete",
            "payment_status": "paid",
            "customer": "cus_1",
            "client_reference_id": null,
            "metadata": { "user_id": user_id.to_string(), "tier": "30day" }
        }))
        .unwrap();
        assert!(session.is_paid());
        assert_eq!(session.user_id(), Some(user_id));
        assert_eq!(session.tier(), Some(Tier::ThirtyDay));
    }

    #[test]
    fn test_unpaid_session() {
        let session: CheckoutSession =
            serde_json::from_str(r#"{"id":"cs_2","payment_status":"unpaid"}"#).unwrap();
        assert!(!session.is_paid());
        assert_eq!(session.user_id(), None);
        assert_eq!(session.tier(), None);
    }
}
