//! Request middleware for the caller-facing functions.

/// Bearer verification against the auth platform
pub mod auth;
