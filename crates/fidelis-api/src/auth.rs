//! HTTP Basic-auth extractor resolving `email:password` to a [`Caller`].

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use fidelis_core::{caller::Caller, store::LedgerStore, user::User};

use crate::{AppState, error::ApiError};

/// Present in a handler means the request carried valid credentials.
pub struct Authenticated {
  pub user: User,
}

impl Authenticated {
  pub fn caller(&self) -> Caller { Caller::new(self.user.id, self.user.role) }
}

/// Split a `Basic` authorization header into email and password.
pub fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), ApiError> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded.trim()).map_err(|_| ApiError::Unauthorized)?;
  let creds = String::from_utf8(decoded).map_err(|_| ApiError::Unauthorized)?;

  let (email, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;
  if email.is_empty() {
    return Err(ApiError::Unauthorized);
  }
  Ok((email.to_owned(), password.to_owned()))
}

/// Check `password` against an argon2 PHC string.
pub fn verify_password(password: &str, phc: &str) -> Result<(), ApiError> {
  let parsed_hash = PasswordHash::new(phc).map_err(|_| ApiError::Unauthorized)?;
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| ApiError::Unauthorized)
}

impl<S: LedgerStore + 'static> FromRequestParts<AppState<S>> for Authenticated {
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let (email, password) = basic_credentials(&parts.headers)?;

    let found = state
      .ledger
      .store()
      .find_credentials(&email)
      .await
      .map_err(|e| {
        tracing::error!(error = %e, "credential lookup failed");
        ApiError::Store(Box::new(e))
      })?;

    let Some((user, hash)) = found else {
      tracing::debug!(email = %email, "unknown account");
      return Err(ApiError::Unauthorized);
    };

    verify_password(&password, &hash).inspect_err(|_| {
      tracing::debug!(user_id = %user.id, "password rejected");
    })?;

    Ok(Authenticated { user })
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use argon2::{PasswordHasher, password_hash::SaltString};
  use axum::{body::Body, http::Request};
  use fidelis_core::{
    Ledger,
    store::LedgerStore as _,
    user::{NewUser, Role},
  };
  use fidelis_store_sqlite::SqliteStore;
  use rand_core::OsRng;

  use super::*;

  fn hash(password: &str) -> String {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string()
  }

  async fn make_state(password: &str) -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let mut user = NewUser::new("staff@parapharm.tn", Role::Employee);
    user.password_hash = Some(hash(password));
    store.create_user(user).await.unwrap();
    AppState::new(Ledger::new(Arc::new(store)))
  }

  async fn extract(
    req: Request<Body>,
    state: &AppState<SqliteStore>,
  ) -> Result<Authenticated, ApiError> {
    let (mut parts, _) = req.into_parts();
    Authenticated::from_request_parts(&mut parts, state).await
  }

  fn basic(user: &str, pass: &str) -> String {
    let encoded = B64.encode(format!("{user}:{pass}"));
    format!("Basic {encoded}")
  }

  fn request(auth: &str) -> Request<Body> {
    Request::builder()
      .header(header::AUTHORIZATION, auth)
      .body(Body::empty())
      .unwrap()
  }

  #[tokio::test]
  async fn correct_credentials_resolve_the_caller() {
    let state = make_state("secret").await;
    let auth = extract(request(&basic("staff@parapharm.tn", "secret")), &state)
      .await
      .unwrap();
    assert_eq!(auth.user.email, "staff@parapharm.tn");
    assert!(auth.caller().is_staff());
  }

  #[tokio::test]
  async fn wrong_password() {
    let state = make_state("secret").await;
    let res = extract(request(&basic("staff@parapharm.tn", "wrong")), &state).await;
    assert!(matches!(res, Err(ApiError::Unauthorized)));
  }

  #[tokio::test]
  async fn unknown_email() {
    let state = make_state("secret").await;
    let res = extract(request(&basic("ghost@parapharm.tn", "secret")), &state).await;
    assert!(matches!(res, Err(ApiError::Unauthorized)));
  }

  #[tokio::test]
  async fn missing_header() {
    let state = make_state("secret").await;
    let req = Request::builder().body(Body::empty()).unwrap();
    assert!(matches!(extract(req, &state).await, Err(ApiError::Unauthorized)));
  }

  #[tokio::test]
  async fn invalid_base64() {
    let state = make_state("secret").await;
    let res = extract(request("Basic !!!not-base64!!!"), &state).await;
    assert!(matches!(res, Err(ApiError::Unauthorized)));
  }

  #[test]
  fn password_may_contain_colons() {
    let mut headers = HeaderMap::new();
    headers.insert(
      header::AUTHORIZATION,
      basic("a@b.tn", "x:y:z").parse().unwrap(),
    );
    let (email, password) = basic_credentials(&headers).unwrap();
    assert_eq!((email.as_str(), password.as_str()), ("a@b.tn", "x:y:z"));
  }
}
