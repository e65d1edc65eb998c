//! Axum route handlers for payments and access.

use axum::{extract::State, http::HeaderMap, Json};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::billing::entitlement::{self, AccessStatus, Tier};
use crate::billing::stripe::{CheckoutRequest, CheckoutSession, StripeError};
use crate::billing::webhook::{parse_event, verify_signature};
use crate::errors::AppError;
use crate::state::AppState;

const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    pub tier: Tier,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct PortalResponse {
    pub url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyBody {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub verified: bool,
    pub access: AccessStatus,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub duplicate: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/stripe/checkout
pub async fn handle_checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<CheckoutResponse>, AppError> {
    user.ensure_same_user(body.user_id)?;

    let prices = &state.config.stripe_prices;
    let price_id = match body.tier {
        Tier::TwoDay => prices.two_day.as_deref(),
        Tier::SevenDay => prices.seven_day.as_deref(),
        Tier::ThirtyDay => prices.thirty_day.as_deref(),
    }
    .ok_or(StripeError::MissingPrice(body.tier))?;

    let profile = entitlement::ensure_profile(&state.db, user.id, user.email.as_deref()).await?;
    let app_url = &state.config.app_url;
    let success_url = format!("{app_url}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}");
    let cancel_url = format!("{app_url}/pricing");

    let session = state
        .stripe
        .create_checkout_session(&CheckoutRequest {
            price_id,
            tier: body.tier,
            user_id: user.id,
            customer_id: profile.stripe_customer_id.as_deref(),
            customer_email: user.email.as_deref(),
            success_url: &success_url,
            cancel_url: &cancel_url,
        })
        .await?;

    let url = session.url.ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("Stripe returned a session without a URL"))
    })?;
    info!("Created checkout session {} for user {} ({})", session.id, user.id, body.tier);

    Ok(Json(CheckoutResponse {
        session_id: session.id,
        url,
    }))
}

/// POST /api/stripe/portal
pub async fn handle_portal(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<PortalResponse>, AppError> {
    let profile = entitlement::ensure_profile(&state.db, user.id, user.email.as_deref()).await?;
    let customer = profile.stripe_customer_id.ok_or_else(|| {
        AppError::Validation("No billing account found. Make a purchase first.".to_string())
    })?;

    let portal = state
        .stripe
        .create_portal_session(&customer, &format!("{}/account", state.config.app_url))
        .await?;
    Ok(Json(PortalResponse { url: portal.url }))
}

/// POST /api/stripe/verify
///
/// Grants access for a completed Checkout Session on return from Stripe,
/// without waiting for the webhook. Safe to repeat.
pub async fn handle_verify(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<VerifyBody>,
) -> Result<Json<VerifyResponse>, AppError> {
    if body.session_id.trim().is_empty() {
        return Err(AppError::Validation("sessionId is required".to_string()));
    }

    let session = state
        .stripe
        .retrieve_checkout_session(body.session_id.trim())
        .await?;
    if session.user_id() != Some(user.id) {
        return Err(AppError::Forbidden(
            "Checkout session belongs to a different user".to_string(),
        ));
    }

    let verified = session.is_paid();
    if verified {
        let mut tx = state.db.begin().await?;
        fulfill_checkout(&mut *tx, &session).await?;
        tx.commit().await?;
    }

    let access =
        entitlement::access_status(&state.db, user.id, state.config.free_resume_limit).await?;
    Ok(Json(VerifyResponse { verified, access }))
}

/// POST /api/stripe/webhook
///
/// Raw body: the signature covers the exact bytes Stripe sent.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|h| h.to_str().ok());
    verify_signature(
        signature,
        &body,
        &state.config.stripe_webhook_secret,
        chrono::Utc::now().timestamp(),
    )
    .map_err(|e| {
        warn!("Rejected Stripe webhook: {e}");
        AppError::Validation(format!("Webhook signature verification failed: {e}"))
    })?;

    let event = parse_event(&body).map_err(|e| AppError::Validation(e.to_string()))?;
    info!("Stripe webhook {} ({})", event.id, event.event_type);

    let mut tx = state.db.begin().await?;
    if !entitlement::record_stripe_event(&mut *tx, &event.id, &event.event_type).await? {
        info!("Stripe event {} already processed", event.id);
        return Ok(Json(WebhookAck {
            received: true,
            duplicate: true,
        }));
    }

    if event.event_type == CHECKOUT_COMPLETED {
        let session: CheckoutSession = serde_json::from_value(event.data.object)
            .map_err(|e| AppError::Validation(format!("Invalid checkout session payload: {e}")))?;
        if session.is_paid() {
            fulfill_checkout(&mut *tx, &session).await?;
        } else {
            info!("Checkout session {} not paid yet; skipping", session.id);
        }
    }

    tx.commit().await?;
    Ok(Json(WebhookAck {
        received: true,
        duplicate: false,
    }))
}

/// GET /api/access
pub async fn handle_access(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<AccessStatus>, AppError> {
    let access =
        entitlement::access_status(&state.db, user.id, state.config.free_resume_limit).await?;
    Ok(Json(access))
}

/// Grants the session's tier to its buyer and remembers the Stripe customer.
async fn fulfill_checkout(
    conn: &mut sqlx::PgConnection,
    session: &CheckoutSession,
) -> Result<(), AppError> {
    let user_id = session.user_id().ok_or_else(|| {
        AppError::Validation(format!("Checkout session {} has no user reference", session.id))
    })?;
    let tier = session.tier().ok_or_else(|| {
        AppError::Validation(format!("Checkout session {} has no tier", session.id))
    })?;

    entitlement::grant_entitlement(&mut *conn, user_id, tier, &session.id).await?;
    if let Some(customer) = session.customer.as_deref() {
        entitlement::set_stripe_customer(&mut *conn, user_id, customer).await?;
    }
    Ok(())
}
