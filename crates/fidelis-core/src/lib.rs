//! Core types, rules and the service layer for the Fidelis points ledger.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod accrual;
pub mod adjustment;
pub mod balance;
pub mod caller;
pub mod entry;
pub mod error;
pub mod ledger;
pub mod order;
pub mod page;
pub mod store;
pub mod user;

pub use error::{Error, Result};
pub use ledger::Ledger;
