//! JSON REST API for the Fidelis points ledger.
//!
//! Exposes an axum [`Router`] backed by any [`LedgerStore`]. Every route
//! requires HTTP Basic credentials (`email:password`) checked against the
//! store. TLS and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", fidelis_api::api_router(ledger.clone()))
//! ```

pub mod auth;
pub mod error;
pub mod extract;
pub mod orders;
pub mod points;

use axum::{
  Router,
  routing::{get, post},
};
use fidelis_core::{Ledger, store::LedgerStore};

pub use error::ApiError;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub ledger: Ledger<S>,
}

impl<S> AppState<S> {
  pub fn new(ledger: Ledger<S>) -> Self { Self { ledger } }
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self { Self { ledger: self.ledger.clone() } }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `ledger`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S: LedgerStore + 'static>(ledger: Ledger<S>) -> Router<()> {
  Router::new()
    // Points
    .route("/fidelity-points", get(points::list::<S>).post(points::adjust::<S>))
    .route("/fidelity-points/drift", get(points::drift::<S>))
    .route("/fidelity-points/{user_id}", get(points::history::<S>))
    .route("/fidelity-points/{user_id}/redeem", post(points::redeem::<S>))
    .route("/fidelity-points/{user_id}/reconcile", get(points::reconcile::<S>))
    .route("/fidelity-points/{user_id}/repair", post(points::repair::<S>))
    // Orders
    .route("/orders", post(orders::create::<S>))
    .route("/orders/{order_id}", get(orders::get_one::<S>).patch(orders::update::<S>))
    .route("/orders/{order_id}/accrue", post(orders::accrue::<S>))
    // Account
    .route("/me", get(points::me))
    .with_state(AppState::new(ledger))
}

#[cfg(test)]
mod tests;
