//! HTTP server assembly and offline maintenance jobs for Fidelis.
//!
//! The binary in `main.rs` is a thin shell over [`app`], [`provision_user`]
//! and [`reconcile_job`].

use std::{path::PathBuf, time::Duration};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use axum::Router;
use fidelis_core::{
  Ledger,
  balance::Reconciliation,
  store::LedgerStore,
  user::{NewUser, User},
};
use rand_core::OsRng;
use serde::Deserialize;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `FIDELIS_*` environment variables.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                 String,
  pub port:                 u16,
  pub store_path:           PathBuf,
  pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                 "127.0.0.1".to_string(),
      port:                 8080,
      store_path:           PathBuf::from("~/.local/share/fidelis/ledger.db"),
      request_timeout_secs: 30,
    }
  }
}

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The complete application: the JSON API under `/api`, request tracing and
/// a per-request timeout.
pub fn app<S: LedgerStore + 'static>(ledger: Ledger<S>, config: &ServerConfig) -> Router {
  Router::new()
    .nest("/api", fidelis_api::api_router(ledger))
    .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
    .layer(TraceLayer::new_for_http())
}

// ─── Provisioning ─────────────────────────────────────────────────────────────

/// Argon2 PHC string for `password`.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string(),
  )
}

/// Create an account that can sign in with `password`.
pub async fn provision_user<S: LedgerStore>(
  store: &S,
  mut user: NewUser,
  password: &str,
) -> anyhow::Result<User> {
  if password.is_empty() {
    anyhow::bail!("password must not be empty");
  }
  user.password_hash = Some(hash_password(password)?);
  let email = user.email.clone();
  let user = store
    .create_user(user)
    .await
    .with_context(|| format!("failed to create user {email}"))?;
  tracing::info!(user_id = %user.id, email = %user.email, role = %user.role, "user created");
  Ok(user)
}

// ─── Reconciliation ───────────────────────────────────────────────────────────

/// Compare every cached balance with its ledger; optionally reset drifted
/// balances to the ledger sum. Returns what was found before any repair.
pub async fn reconcile_job<S: LedgerStore>(
  store: &S,
  repair: bool,
) -> anyhow::Result<Vec<Reconciliation>> {
  let drifted = store
    .reconcile_all()
    .await
    .context("failed to reconcile balances")?;

  for r in &drifted {
    tracing::warn!(
      user_id = %r.user_id,
      cached = r.cached_balance,
      ledger = r.ledger_sum,
      "balance drift"
    );
    if repair {
      store
        .repair_balance(r.user_id)
        .await
        .with_context(|| format!("failed to repair balance of {}", r.user_id))?;
      tracing::info!(user_id = %r.user_id, balance = r.ledger_sum, "balance repaired");
    }
  }

  if drifted.is_empty() {
    tracing::info!("all cached balances match their ledgers");
  }
  Ok(drifted)
}
