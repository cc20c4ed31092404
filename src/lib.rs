//! SpendNote server functions.
//!
//! Backend endpoints of the SpendNote web app: Stripe checkout and billing
//! portal sessions, the Stripe webhook that keeps profile billing in sync,
//! account deletion, and transactional email (invites, welcome, invite accepted).
//!
//! The router is built in [`app`]; external platforms sit behind the traits in
//! [`services`] so handlers can be driven against in-memory fakes.

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod links;
pub mod middleware;
pub mod models;
pub mod services;
pub mod templates;
