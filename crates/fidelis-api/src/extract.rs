//! Body and path extractors that refuse malformed input with the API's own
//! JSON error body.

use axum::{
  extract::{
    FromRequest, FromRequestParts,
    rejection::{JsonRejection, PathRejection},
  },
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::ApiError;

/// [`axum::Json`] with a 400 rejection. Also usable as a response.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
  fn into_response(self) -> Response { axum::Json(self.0).into_response() }
}

/// [`axum::extract::Path`] with a 400 rejection.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct Path<T>(pub T);

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    let status = match &rejection {
      JsonRejection::MissingJsonContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
      _ => StatusCode::BAD_REQUEST,
    };
    tracing::debug!(error = %rejection.body_text(), "request body refused");
    Self::Rejected {
      status,
      message: format!("invalid request body: {}", rejection.body_text()),
    }
  }
}

impl From<PathRejection> for ApiError {
  fn from(rejection: PathRejection) -> Self {
    Self::Rejected {
      status:  StatusCode::BAD_REQUEST,
      message: format!("invalid path: {}", rejection.body_text()),
    }
  }
}
