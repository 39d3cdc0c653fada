//! HTTP-level tests driving the router with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use fidelis_core::{
  Ledger,
  store::LedgerStore as _,
  user::{NewUser, Role, User},
};
use fidelis_store_sqlite::SqliteStore;
use rand_core::OsRng;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use super::api_router;

const PASSWORD: &str = "secret";

struct Fixture {
  router:   Router,
  ledger:   Ledger<SqliteStore>,
  admin:    User,
  employee: User,
  client:   User,
  other:    User,
}

async fn fixture() -> Fixture {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let salt = SaltString::generate(&mut OsRng);
  let hash = Argon2::default()
    .hash_password(PASSWORD.as_bytes(), &salt)
    .unwrap()
    .to_string();

  let mut users = Vec::new();
  for (email, role) in [
    ("admin@parapharm.tn", Role::Admin),
    ("staff@parapharm.tn", Role::Employee),
    ("amira@example.tn", Role::Client),
    ("omar@example.tn", Role::Client),
  ] {
    let mut input = NewUser::new(email, role);
    input.password_hash = Some(hash.clone());
    users.push(store.create_user(input).await.unwrap());
  }
  let [admin, employee, client, other]: [User; 4] = users.try_into().unwrap();

  let ledger = Ledger::new(Arc::new(store));
  Fixture {
    router: api_router(ledger.clone()),
    ledger,
    admin,
    employee,
    client,
    other,
  }
}

fn basic(user: &User) -> String {
  format!("Basic {}", B64.encode(format!("{}:{PASSWORD}", user.email)))
}

async fn call(
  f: &Fixture,
  as_user: Option<&User>,
  method: &str,
  uri: &str,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some(u) = as_user {
    builder = builder.header(header::AUTHORIZATION, basic(u));
  }
  let req = match body {
    Some(v) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(v.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };

  let resp = f.router.clone().oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let json = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
  };
  (status, json)
}

async fn credit(f: &Fixture, user: &User, points: i64) {
  let body = json!({ "userId": user.id, "points": points, "description": "Bienvenue" });
  let (status, _) = call(f, Some(&f.admin), "POST", "/fidelity-points", Some(body)).await;
  assert_eq!(status, StatusCode::CREATED);
}

// ── Authentication ──────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_credentials_are_challenged() {
  let f = fixture().await;
  let req = Request::builder().uri("/me").body(Body::empty()).unwrap();
  let resp = f.router.clone().oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
}

#[tokio::test]
async fn me_returns_the_caller() {
  let f = fixture().await;
  let (status, body) = call(&f, Some(&f.client), "GET", "/me", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["email"], "amira@example.tn");
  assert_eq!(body["fidelityPoints"], 0);
  assert_eq!(body["role"], "CLIENT");
}

// ── Adjustments ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn staff_adjustment_is_visible_in_history() {
  let f = fixture().await;
  let body = json!({
    "userId": f.client.id,
    "points": 1000,
    "description": "Geste commercial",
  });
  let (status, created) =
    call(&f, Some(&f.employee), "POST", "/fidelity-points", Some(body)).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(created["balance"], 1000);
  assert_eq!(created["entry"]["type"], "MANUAL_ADD");
  assert_eq!(created["entry"]["typeLabel"], "Ajout manuel");

  let uri = format!("/fidelity-points/{}", f.client.id);
  let (status, page) = call(&f, Some(&f.client), "GET", &uri, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(page["user"]["fidelityPoints"], 1000);
  assert_eq!(page["history"][0]["description"], "Geste commercial");
  assert_eq!(page["pagination"]["total"], 1);
  assert_eq!(page["pagination"]["limit"], 10);
}

#[tokio::test]
async fn clients_cannot_adjust() {
  let f = fixture().await;
  let body = json!({ "userId": f.client.id, "points": 1000, "description": "free" });
  let (status, _) = call(&f, Some(&f.client), "POST", "/fidelity-points", Some(body)).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert_eq!(f.ledger.store().get_user(f.client.id).await.unwrap().unwrap().fidelity_points, 0);
}

#[tokio::test]
async fn overdraw_is_unprocessable_and_explained_to_staff() {
  let f = fixture().await;
  credit(&f, &f.client, 300).await;

  let body = json!({ "userId": f.client.id, "points": -500, "description": "Correction" });
  let (status, err) = call(&f, Some(&f.admin), "POST", "/fidelity-points", Some(body)).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert!(err["error"].as_str().unwrap().contains("insufficient balance"));
}

#[tokio::test]
async fn customers_get_a_generic_message_for_rule_failures() {
  let f = fixture().await;
  credit(&f, &f.client, 100).await;

  let uri = format!("/fidelity-points/{}/redeem", f.client.id);
  let body = json!({ "points": 500 });
  let (status, err) = call(&f, Some(&f.client), "POST", &uri, Some(body)).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  let message = err["error"].as_str().unwrap();
  assert!(!message.contains("insufficient"), "leaked detail: {message}");
}

#[tokio::test]
async fn non_integer_points_are_a_bad_request() {
  let f = fixture().await;
  for points in [json!(1.5), json!("abc")] {
    let body = json!({ "userId": f.client.id, "points": points, "description": "x" });
    let (status, err) = call(&f, Some(&f.admin), "POST", "/fidelity-points", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(err["error"].as_str().unwrap().starts_with("invalid request body"));
  }

  let uri = format!("/fidelity-points/{}/redeem", f.client.id);
  let (status, err) = call(&f, Some(&f.client), "POST", &uri, Some(json!({ "points": 0.5 }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(err["error"].is_string());
  assert_eq!(f.ledger.store().get_user(f.client.id).await.unwrap().unwrap().fidelity_points, 0);
}

#[tokio::test]
async fn malformed_ids_are_a_bad_request() {
  let f = fixture().await;
  let (status, err) =
    call(&f, Some(&f.admin), "GET", "/fidelity-points/not-a-uuid", None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(err["error"].as_str().unwrap().starts_with("invalid path"));
}

#[tokio::test]
async fn oversized_adjustment_is_a_bad_request() {
  let f = fixture().await;
  credit(&f, &f.client, 1).await;
  let body = json!({ "userId": f.client.id, "points": i64::MAX, "description": "x" });
  let (status, _) = call(&f, Some(&f.admin), "POST", "/fidelity-points", Some(body)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, me) = call(&f, Some(&f.client), "GET", "/me", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(me["fidelityPoints"], 1);
}

#[tokio::test]
async fn adjusting_unknown_user_is_not_found() {
  let f = fixture().await;
  let body = json!({ "userId": uuid::Uuid::new_v4(), "points": 5, "description": "x" });
  let (status, _) = call(&f, Some(&f.admin), "POST", "/fidelity-points", Some(body)).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Redemption ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn clients_redeem_their_own_points_only() {
  let f = fixture().await;
  credit(&f, &f.client, 500).await;
  credit(&f, &f.other, 500).await;

  let own = format!("/fidelity-points/{}/redeem", f.client.id);
  let (status, body) =
    call(&f, Some(&f.client), "POST", &own, Some(json!({ "points": 200, "reference": "BON-5" })))
      .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["balance"], 300);
  assert_eq!(body["entry"]["points"], -200);
  assert_eq!(body["entry"]["description"], "Points utilisés — BON-5");

  let theirs = format!("/fidelity-points/{}/redeem", f.other.id);
  let (status, _) =
    call(&f, Some(&f.client), "POST", &theirs, Some(json!({ "points": 1 }))).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

// ── History ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_history_has_zero_pages() {
  let f = fixture().await;
  let uri = format!("/fidelity-points/{}", f.client.id);
  let (status, page) = call(&f, Some(&f.client), "GET", &uri, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(page["history"], json!([]));
  assert_eq!(page["pagination"]["total"], 0);
  assert_eq!(page["pagination"]["page"], 1);
  assert_eq!(page["pagination"]["totalPages"], 0);
}

#[tokio::test]
async fn staff_default_to_larger_pages() {
  let f = fixture().await;
  let uri = format!("/fidelity-points/{}", f.client.id);
  let (_, page) = call(&f, Some(&f.employee), "GET", &uri, None).await;
  assert_eq!(page["pagination"]["limit"], 20);
}

#[tokio::test]
async fn clients_cannot_read_other_histories() {
  let f = fixture().await;
  let uri = format!("/fidelity-points/{}", f.other.id);
  let (status, _) = call(&f, Some(&f.client), "GET", &uri, None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn out_of_range_limit_is_a_bad_request() {
  let f = fixture().await;
  let uri = format!("/fidelity-points/{}?limit=500", f.client.id);
  let (status, err) = call(&f, Some(&f.admin), "GET", &uri, None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(err["error"].as_str().unwrap().contains("limit"));
}

#[tokio::test]
async fn snapshot_keeps_later_pages_stable() {
  let f = fixture().await;
  for _ in 0..4 {
    credit(&f, &f.client, 10).await;
  }

  let first = format!("/fidelity-points/{}?page=1&limit=2", f.client.id);
  let (_, page1) = call(&f, Some(&f.admin), "GET", &first, None).await;
  let snapshot = page1["pagination"]["snapshot"].as_i64().unwrap();

  credit(&f, &f.client, 10).await;

  let second = format!(
    "/fidelity-points/{}?page=2&limit=2&snapshot={snapshot}",
    f.client.id
  );
  let (_, page2) = call(&f, Some(&f.admin), "GET", &second, None).await;
  assert_eq!(page2["pagination"]["total"], 4);
  let last_of_first = page1["history"][1]["seq"].as_i64().unwrap();
  let first_of_second = page2["history"][0]["seq"].as_i64().unwrap();
  assert!(first_of_second < last_of_first);
}

// ── Members ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn member_listing_is_staff_only() {
  let f = fixture().await;
  credit(&f, &f.other, 50).await;

  let (status, body) = call(&f, Some(&f.employee), "GET", "/fidelity-points", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["members"][0]["email"], "omar@example.tn");
  assert_eq!(body["pagination"]["total"], 4);

  let (status, body) =
    call(&f, Some(&f.employee), "GET", "/fidelity-points?search=AMIRA", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["members"].as_array().unwrap().len(), 1);

  let (status, _) = call(&f, Some(&f.client), "GET", "/fidelity-points", None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

// ── Orders ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delivered_paid_order_credits_once() {
  let f = fixture().await;
  let body = json!({ "orderNumber": "CMD-2001", "userId": f.client.id, "total": "200.000" });
  let (status, created) = call(&f, Some(&f.employee), "POST", "/orders", Some(body)).await;
  assert_eq!(status, StatusCode::CREATED);
  let order_id = created["order"]["id"].as_str().unwrap().to_owned();
  assert!(created.get("pointsAwarded").is_none());

  let uri = format!("/orders/{order_id}");
  let update = json!({ "status": "DELIVERED", "paymentStatus": "COMPLETED" });
  let (status, t) = call(&f, Some(&f.employee), "PATCH", &uri, Some(update.clone())).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(t["pointsAwarded"], 4000);

  let (status, t) = call(&f, Some(&f.employee), "PATCH", &uri, Some(update)).await;
  assert_eq!(status, StatusCode::OK);
  assert!(t.get("pointsAwarded").is_none());

  let accrue = format!("/orders/{order_id}/accrue");
  let (status, _) = call(&f, Some(&f.admin), "POST", &accrue, None).await;
  assert_eq!(status, StatusCode::CONFLICT);

  let (_, me) = call(&f, Some(&f.client), "GET", "/me", None).await;
  assert_eq!(me["fidelityPoints"], 4000);

  let history = format!("/fidelity-points/{}", f.client.id);
  let (_, page) = call(&f, Some(&f.client), "GET", &history, None).await;
  assert_eq!(page["history"][0]["type"], "EARNED_PURCHASE");
  assert_eq!(page["history"][0]["order"]["orderNumber"], "CMD-2001");
}

#[tokio::test]
async fn accruing_an_undelivered_order_is_unprocessable() {
  let f = fixture().await;
  let body = json!({ "orderNumber": "CMD-1", "userId": f.client.id, "total": "80" });
  let (_, created) = call(&f, Some(&f.admin), "POST", "/orders", Some(body)).await;
  let uri = format!("/orders/{}/accrue", created["order"]["id"].as_str().unwrap());

  let (status, _) = call(&f, Some(&f.admin), "POST", &uri, None).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn orders_are_visible_to_their_owner_only() {
  let f = fixture().await;
  let body = json!({ "orderNumber": "CMD-1", "userId": f.client.id, "total": "80" });
  let (_, created) = call(&f, Some(&f.admin), "POST", "/orders", Some(body)).await;
  let uri = format!("/orders/{}", created["order"]["id"].as_str().unwrap());

  let (status, order) = call(&f, Some(&f.client), "GET", &uri, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(order["orderNumber"], "CMD-1");

  let (status, _) = call(&f, Some(&f.other), "GET", &uri, None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn order_totals_finer_than_a_millime_are_refused() {
  let f = fixture().await;
  let body = json!({
    "orderNumber": "CMD-1",
    "userId": f.client.id,
    "total": "10.1249",
    "status": "DELIVERED",
    "paymentStatus": "COMPLETED",
  });
  let (status, _) = call(&f, Some(&f.admin), "POST", "/orders", Some(body)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let body = json!({ "orderNumber": "CMD-1", "userId": f.client.id, "total": "10.125" });
  let (status, _) = call(&f, Some(&f.admin), "POST", "/orders", Some(body)).await;
  assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn duplicate_order_number_conflicts() {
  let f = fixture().await;
  let body = json!({ "orderNumber": "CMD-1", "userId": f.client.id, "total": "10" });
  call(&f, Some(&f.admin), "POST", "/orders", Some(body.clone())).await;
  let (status, _) = call(&f, Some(&f.admin), "POST", "/orders", Some(body)).await;
  assert_eq!(status, StatusCode::CONFLICT);
}

// ── Integrity ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn reconcile_and_repair() {
  let f = fixture().await;
  credit(&f, &f.client, 250).await;

  let uri = format!("/fidelity-points/{}/reconcile", f.client.id);
  let (status, r) = call(&f, Some(&f.employee), "GET", &uri, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(r["cachedBalance"], 250);
  assert_eq!(r["ledgerSum"], 250);
  assert_eq!(r["drift"], 0);

  let (status, drift) = call(&f, Some(&f.employee), "GET", "/fidelity-points/drift", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(drift, json!([]));

  let repair = format!("/fidelity-points/{}/repair", f.client.id);
  let (status, _) = call(&f, Some(&f.employee), "POST", &repair, None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  let (status, _) = call(&f, Some(&f.admin), "POST", &repair, None).await;
  assert_eq!(status, StatusCode::OK);
}
