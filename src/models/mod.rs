//! Data models: platform rows, Stripe payloads and request bodies.

/// Plans, billing cycles and the price catalog
pub mod billing;
/// Organization invites and membership roles
pub mod invite;
/// Profile rows
pub mod profile;
/// Function request bodies
pub mod requests;
/// Stripe webhook payloads
pub mod stripe;
