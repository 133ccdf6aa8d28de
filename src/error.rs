use axum::{
  response::{IntoResponse, Response},
  Json,
};
use reqwest::StatusCode;
use serde_json::json;

const GENERIC_MESSAGE: &str = "Failed to resolve video";

#[derive(thiserror::Error, Debug)]
pub enum Error {
  #[error("{0}")]
  Validation(String),
  #[error("network error: {0}")]
  Network(#[from] reqwest::Error),
  #[error("no response obtained for {0}")]
  NoResponse(String),
  #[error("no playable video found on page")]
  NotFound,
  #[error("upstream responded with {0}")]
  Upstream(StatusCode),
  #[error(transparent)]
  Http(#[from] http::Error),
  #[error("server error: {0}")]
  Server(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  pub fn unsupported_url(url: &str, reason: &str) -> Self {
    Error::Validation(format!("unsupported url {url:?}: {reason}"))
  }

  pub fn status(&self) -> StatusCode {
    match self {
      Error::Validation(_) => StatusCode::BAD_REQUEST,
      Error::NotFound => StatusCode::NOT_FOUND,
      Error::Upstream(status) => *status,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = self.status();
    let mut message = self.to_string();
    if message.trim().is_empty() {
      message = GENERIC_MESSAGE.to_owned();
    }

    let body = json!({ "success": false, "error": message });
    (status, Json(body)).into_response()
  }
}
