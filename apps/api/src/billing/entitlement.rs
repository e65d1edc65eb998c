//! Access tiers and entitlement windows.
//!
//! A user has access while any purchased window is unexpired. Buying again
//! during an active window extends from the current expiry. Without a window,
//! a user may still unlock up to `FREE_RESUME_LIMIT` resumes with free credits.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::models::billing::{EntitlementRow, UserProfileRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "2day")]
    TwoDay,
    #[serde(rename = "7day")]
    SevenDay,
    #[serde(rename = "30day")]
    ThirtyDay,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::TwoDay => "2day",
            Tier::SevenDay => "7day",
            Tier::ThirtyDay => "30day",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Tier::TwoDay => Duration::hours(48),
            Tier::SevenDay => Duration::days(7),
            Tier::ThirtyDay => Duration::days(30),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "2day" => Ok(Tier::TwoDay),
            "7day" => Ok(Tier::SevenDay),
            "30day" => Ok(Tier::ThirtyDay),
            other => Err(format!("unknown tier '{other}'")),
        }
    }
}

/// `(starts_at, expires_at)` for a new purchase.
pub fn purchase_window(
    now: DateTime<Utc>,
    current_expiry: Option<DateTime<Utc>>,
    tier: Tier,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let starts_at = match current_expiry {
        Some(expiry) if expiry > now => expiry,
        _ => now,
    };
    (starts_at, starts_at + tier.duration())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessStatus {
    pub has_access: bool,
    pub tier: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub free_resumes_remaining: i32,
}

impl AccessStatus {
    pub fn from_parts(active: Option<&EntitlementRow>, free_used: i32, free_limit: i32) -> Self {
        Self {
            has_access: active.is_some(),
            tier: active.map(|e| e.tier.clone()),
            expires_at: active.map(|e| e.expires_at),
            free_resumes_remaining: (free_limit - free_used).max(0),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Queries
// ────────────────────────────────────────────────────────────────────────────

pub async fn ensure_profile(
    pool: &PgPool,
    user_id: Uuid,
    email: Option<&str>,
) -> Result<UserProfileRow, sqlx::Error> {
    sqlx::query_as::<_, UserProfileRow>(
        r#"
        INSERT INTO user_profiles (user_id, email)
        VALUES ($1, $2)
        ON CONFLICT (user_id) DO UPDATE
            SET email = COALESCE(EXCLUDED.email, user_profiles.email)
        RETURNING user_id, email, stripe_customer_id, free_resumes_used, created_at, updated_at
        "#,
    )
    .bind(user_id)
    .bind(email)
    .fetch_one(pool)
    .await
}

pub async fn set_stripe_customer(
    conn: &mut PgConnection,
    user_id: Uuid,
    customer_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO user_profiles (user_id, stripe_customer_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id) DO UPDATE
            SET stripe_customer_id = EXCLUDED.stripe_customer_id, updated_at = NOW()
        "#,
    )
    .bind(user_id)
    .bind(customer_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Latest-expiring unexpired window. Extensions chain from the previous
/// expiry, so any unexpired row implies current access.
pub async fn active_entitlement(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<EntitlementRow>, sqlx::Error> {
    sqlx::query_as::<_, EntitlementRow>(
        r#"
        SELECT id, user_id, tier, starts_at, expires_at, stripe_session_id, created_at
        FROM entitlements
        WHERE user_id = $1 AND expires_at > NOW()
        ORDER BY expires_at DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn access_status(
    pool: &PgPool,
    user_id: Uuid,
    free_limit: i32,
) -> Result<AccessStatus, sqlx::Error> {
    let active = active_entitlement(pool, user_id).await?;
    let free_used: Option<i32> =
        sqlx::query_scalar("SELECT free_resumes_used FROM user_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    Ok(AccessStatus::from_parts(
        active.as_ref(),
        free_used.unwrap_or(0),
        free_limit,
    ))
}

/// Grants a window for a Checkout Session. Returns `None` when this session
/// was already granted.
pub async fn grant_entitlement(
    conn: &mut PgConnection,
    user_id: Uuid,
    tier: Tier,
    stripe_session_id: &str,
) -> Result<Option<EntitlementRow>, sqlx::Error> {
    // Serialise concurrent grants for the same user.
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1::text))")
        .bind(user_id.to_string())
        .execute(&mut *conn)
        .await?;

    let current_expiry: Option<DateTime<Utc>> =
        sqlx::query_scalar("SELECT MAX(expires_at) FROM entitlements WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await?;

    let (starts_at, expires_at) = purchase_window(Utc::now(), current_expiry, tier);

    let row = sqlx::query_as::<_, EntitlementRow>(
        r#"
        INSERT INTO entitlements (user_id, tier, starts_at, expires_at, stripe_session_id)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (stripe_session_id) DO NOTHING
        RETURNING id, user_id, tier, starts_at, expires_at, stripe_session_id, created_at
        "#,
    )
    .bind(user_id)
    .bind(tier.as_str())
    .bind(starts_at)
    .bind(expires_at)
    .bind(stripe_session_id)
    .fetch_optional(&mut *conn)
    .await?;

    match &row {
        Some(e) => info!(
            "Granted {tier} access to user {user_id} until {} (session {stripe_session_id})",
            e.expires_at
        ),
        None => info!("Checkout session {stripe_session_id} already granted"),
    }
    Ok(row)
}

/// Records a webhook event id. Returns false when it was already processed.
pub async fn record_stripe_event(
    conn: &mut PgConnection,
    event_id: &str,
    event_type: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO stripe_events (event_id, event_type) VALUES ($1, $2) ON CONFLICT (event_id) DO NOTHING",
    )
    .bind(event_id)
    .bind(event_type)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Spends one free-resume credit. Returns false when none remain.
pub async fn consume_free_credit(
    executor: impl PgExecutor<'_>,
    user_id: Uuid,
    free_limit: i32,
) -> Result<bool, sqlx::Error> {
    if free_limit <= 0 {
        return Ok(false);
    }
    let result = sqlx::query(
        r#"
        INSERT INTO user_profiles (user_id, free_resumes_used)
        VALUES ($1, 1)
        ON CONFLICT (user_id) DO UPDATE
            SET free_resumes_used = user_profiles.free_resumes_used + 1, updated_at = NOW()
            WHERE user_profiles.free_resumes_used < $2
        "#,
    )
    .bind(user_id)
    .bind(free_limit)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}
