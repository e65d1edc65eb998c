// Payments: Stripe Checkout, webhook fulfilment, and time-boxed access tiers.
pub mod entitlement;
pub mod handlers;
pub mod stripe;
pub mod webhook;
