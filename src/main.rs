use std::{sync::Arc, time::Duration};

use axum::{
  response::IntoResponse,
  routing::{get, post},
  Router,
};
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle, Toplevel};
use tracing::info;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

mod config;
mod descriptor;
mod error;
mod extractor;
mod fetch;
mod headers;
mod relay;
mod resolve;
mod util;

pub use config::Config;
pub use error::{Error, Result};

use fetch::Fetcher;

/// Shared, read-only per-process state handed to every request.
#[derive(Clone)]
pub struct AppState {
  pub config: Arc<Config>,
  pub fetcher: Fetcher,
  pub http: reqwest::Client,
}

impl AppState {
  pub fn new(config: Config) -> Result<Self> {
    let fetcher = Fetcher::new(config.max_redirects)?;
    let http = reqwest::Client::builder().build()?;

    Ok(Self {
      config: Arc::new(config),
      fetcher,
      http,
    })
  }

  /// Test servers all listen on loopback, so the relay may reach them.
  #[cfg(test)]
  pub fn for_test() -> Self {
    Self::new(Config {
      relay_private_hosts: true,
      ..Config::default()
    })
    .unwrap()
  }
}

pub fn app(state: AppState) -> Router {
  Router::new()
    .route("/health", get(health))
    .route("/api/resolve-video", post(resolve::resolve_video))
    .route("/api/relay-download", get(relay::relay_download))
    .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
  let env_filter = EnvFilter::builder()
    .with_default_directive(LevelFilter::INFO.into())
    .from_env_lossy();
  tracing_subscriber::fmt().with_env_filter(env_filter).init();

  let state = AppState::new(Config::from_env())?;

  Toplevel::new(move |s| async move {
    s.start(SubsystemBuilder::new("http", move |subsys| serve(subsys, state)));
  })
  .catch_signals()
  .handle_shutdown_requests(Duration::from_secs(5))
  .await
  .map_err(|e| Error::Server(e.to_string()))
}

async fn serve(subsys: SubsystemHandle, state: AppState) -> Result<()> {
  let addr = state.config.listen_addr;
  let server = axum::Server::try_bind(&addr)
    .map_err(|e| Error::Server(format!("cannot bind {addr}: {e}")))?;

  info!("Listening on {addr}");
  server
    .serve(app(state).into_make_service())
    .with_graceful_shutdown(subsys.on_shutdown_requested())
    .await
    .map_err(|e| Error::Server(e.to_string()))
}

async fn health() -> impl IntoResponse {
  "ok".to_owned()
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::util::test_server::spawn;

  #[tokio::test]
  async fn test_health() {
    let base = spawn(app(AppState::for_test())).await;
    let body = reqwest::get(format!("{base}/health"))
      .await
      .unwrap()
      .text()
      .await
      .unwrap();
    assert_eq!(body, "ok");
  }
}
