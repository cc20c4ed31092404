//! Clients for the external platforms and the logic shared by handlers.

/// Caller identity and account removal (auth platform)
pub mod identity;
/// Outgoing email
pub mod mailer;
/// Stripe customers, checkout and portal sessions
pub mod payments;
/// Invite rate limiting
pub mod rate_limit;
/// Table operations on the platform database
pub mod store;
/// Stripe webhook signature verification
pub mod webhook_signature;
