use std::net::IpAddr;

use async_trait::async_trait;
use axum::{
  body::{self, StreamBody},
  extract::{FromRequestParts, Query, State},
  http::Response,
  response::Response as AxumResponse,
};
use futures::StreamExt;
use http_types::Url;
use reqwest::{header, StatusCode};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{headers, util::ByteStream, AppState, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
  Video,
  Audio,
}

impl MediaKind {
  // anything but "audio" is relayed as video
  fn from_query(kind: Option<&str>) -> Self {
    match kind {
      Some("audio") => MediaKind::Audio,
      _ => MediaKind::Video,
    }
  }

  pub fn content_type(self) -> &'static str {
    match self {
      MediaKind::Video => "video/mp4",
      MediaKind::Audio => "audio/mp4",
    }
  }

  pub fn filename(self) -> &'static str {
    match self {
      MediaKind::Video => "kuaishou_video.mp4",
      MediaKind::Audio => "kuaishou_audio.m4a",
    }
  }
}

#[derive(Debug)]
pub struct RelayRequest {
  pub url: Url,
  pub kind: MediaKind,
}

#[derive(Deserialize)]
struct RelayQuery {
  url: Option<String>,
  #[serde(rename = "type")]
  kind: Option<String>,
}

impl RelayRequest {
  fn from_query(query: RelayQuery) -> Result<Self> {
    let raw = query
      .url
      .as_deref()
      .map(str::trim)
      .filter(|u| !u.is_empty())
      .ok_or_else(|| Error::Validation("missing url parameter".into()))?;

    let url: Url = raw
      .parse()
      .map_err(|_| Error::unsupported_url(raw, "not an absolute url"))?;
    if !matches!(url.scheme(), "http" | "https") {
      return Err(Error::unsupported_url(raw, "not http(s)"));
    }

    Ok(Self {
      url,
      kind: MediaKind::from_query(query.kind.as_deref()),
    })
  }
}

/// Whether `url` names a loopback, private, link-local or otherwise
/// non-public host. Only literal addresses and `localhost` are caught;
/// names are not resolved.
fn is_private_host(url: &Url) -> bool {
  let Some(host) = url.host_str() else {
    return true;
  };
  let host = host.trim_end_matches('.').to_ascii_lowercase();
  if host == "localhost" || host.ends_with(".localhost") {
    return true;
  }

  match host.trim_start_matches('[').trim_end_matches(']').parse() {
    Ok(ip) => is_private_ip(ip),
    Err(_) => false,
  }
}

fn is_private_ip(ip: IpAddr) -> bool {
  match ip {
    IpAddr::V4(ip) => {
      ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_multicast()
    }
    IpAddr::V6(ip) => {
      if let Some(v4) = ip.to_ipv4_mapped() {
        return is_private_ip(IpAddr::V4(v4));
      }
      let first = ip.segments()[0];
      ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        // fc00::/7 unique local, fe80::/10 link-local
        || first & 0xfe00 == 0xfc00
        || first & 0xffc0 == 0xfe80
    }
  }
}

#[async_trait]
impl<S> FromRequestParts<S> for RelayRequest
where
  S: Send + Sync,
{
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut http::request::Parts,
    state: &S,
  ) -> Result<Self, Self::Rejection> {
    let Query(query) =
      Query::<RelayQuery>::from_request_parts(parts, state)
        .await
        .map_err(|e| Error::Validation(e.body_text()))?;

    RelayRequest::from_query(query)
  }
}

pub async fn relay_download(
  State(state): State<AppState>,
  req: RelayRequest,
) -> Result<AxumResponse> {
  if !state.config.relay_private_hosts && is_private_host(&req.url) {
    warn!(url = %req.url, "refusing to relay from a private address");
    return Err(Error::unsupported_url(req.url.as_str(), "private address"));
  }

  relay(&state.http, req).await
}

/// Stream `req.url` back to the caller chunk by chunk. Failures up to and
/// including the first body chunk become error responses; after that the
/// stream is simply cut.
pub async fn relay(
  client: &reqwest::Client,
  req: RelayRequest,
) -> Result<AxumResponse> {
  let RelayRequest { url, kind } = req;
  info!(%url, ?kind, "relaying media");

  let upstream = client
    .get(url.clone())
    .headers(headers::headers(Some(url.as_str())))
    .send()
    .await?;

  let status = upstream.status();
  if !status.is_success() {
    warn!(%url, %status, "upstream refused media");
    return Err(Error::Upstream(status));
  }

  let content_length = upstream
    .headers()
    .get(header::CONTENT_LENGTH)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.parse::<u64>().ok());

  let mut upstream_body = upstream.bytes_stream().boxed();
  let first = match upstream_body.next().await {
    Some(Ok(chunk)) => Some(Ok(chunk)),
    Some(Err(e)) => {
      warn!(%url, "upstream body failed before any byte: {e}");
      return Err(e.into());
    }
    None => None,
  };
  let chunks = futures::stream::iter(first).chain(upstream_body);

  let mut resp = Response::builder()
    .status(StatusCode::OK)
    .header(header::CONTENT_TYPE, kind.content_type())
    .header(
      header::CONTENT_DISPOSITION,
      format!("attachment; filename=\"{}\"", kind.filename()),
    );
  if let Some(len) = content_length {
    resp = resp.header(header::CONTENT_LENGTH, len);
  }

  let stream = ByteStream::new(chunks, url).limit_bytes(content_length);
  Ok(resp.body(body::boxed(StreamBody::new(stream)))?)
}

#[cfg(test)]
mod test {
  use axum::{
    body::Bytes, http::StatusCode as AxumStatus, response::IntoResponse,
    routing::get, Router,
  };

  use super::*;
  use crate::util::test_server::spawn;

  fn upstream() -> Router {
    Router::new()
      .route("/media", get(|| async { vec![7u8; 1000] }))
      .route(
        "/chunked",
        get(|| async {
          let chunks = (0..4)
            .map(|_| Ok::<_, std::io::Error>(Bytes::from(vec![1u8; 256])));
          StreamBody::new(futures::stream::iter(chunks))
        }),
      )
      .route(
        "/broken",
        get(|| async {
          let chunks = vec![Err::<Bytes, _>(std::io::Error::new(
            std::io::ErrorKind::Other,
            "boom",
          ))];
          StreamBody::new(futures::stream::iter(chunks))
        }),
      )
      .route(
        "/partial",
        get(|| async {
          let chunks = vec![
            Ok(Bytes::from(vec![3u8; 256])),
            Err(std::io::Error::new(std::io::ErrorKind::Other, "cut")),
          ];
          (
            [(header::CONTENT_LENGTH, "1000")],
            StreamBody::new(futures::stream::iter(chunks)),
          )
        }),
      )
      .route(
        "/missing",
        get(|| async { (AxumStatus::NOT_FOUND, "gone").into_response() }),
      )
  }

  async fn relay_get(
    app: &str,
    media: &str,
    kind: &str,
  ) -> reqwest::Response {
    reqwest::Client::new()
      .get(format!("{app}/api/relay-download"))
      .query(&[("url", media), ("type", kind)])
      .send()
      .await
      .unwrap()
  }

  #[tokio::test]
  async fn test_relays_exact_length() {
    let media = spawn(upstream()).await;
    let app = spawn(crate::app(AppState::for_test())).await;

    let resp = relay_get(&app, &format!("{media}/media"), "video").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_LENGTH], "1000");
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(
      resp.headers()[header::CONTENT_DISPOSITION],
      "attachment; filename=\"kuaishou_video.mp4\""
    );
    assert_eq!(resp.bytes().await.unwrap().len(), 1000);
  }

  #[tokio::test]
  async fn test_audio_kind_and_no_fabricated_length() {
    let media = spawn(upstream()).await;
    let app = spawn(crate::app(AppState::for_test())).await;

    let resp = relay_get(&app, &format!("{media}/chunked"), "audio").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get(header::CONTENT_LENGTH).is_none());
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "audio/mp4");
    assert_eq!(resp.bytes().await.unwrap().len(), 1024);
  }

  #[tokio::test]
  async fn test_upstream_status_passed_through() {
    let media = spawn(upstream()).await;
    let app = spawn(crate::app(AppState::for_test())).await;

    let resp = relay_get(&app, &format!("{media}/missing"), "video").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
  }

  #[tokio::test]
  async fn test_failure_before_first_byte_is_error_response() {
    let media = spawn(upstream()).await;
    let app = spawn(crate::app(AppState::for_test())).await;

    let resp = relay_get(&app, &format!("{media}/broken"), "video").await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
  }

  #[tokio::test]
  async fn test_failure_mid_body_cuts_stream() {
    let media = spawn(upstream()).await;
    let app = spawn(crate::app(AppState::for_test())).await;

    let resp = relay_get(&app, &format!("{media}/partial"), "video").await;
    // headers are already committed by the time the upstream breaks
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(resp.headers()[header::CONTENT_LENGTH], "1000");
    assert!(resp.headers().contains_key(header::CONTENT_DISPOSITION));

    if let Ok(body) = resp.bytes().await {
      assert!(body.len() < 1000);
      assert!(serde_json::from_slice::<serde_json::Value>(&body).is_err());
    }
  }

  #[tokio::test]
  async fn test_caller_hangup_leaves_server_up() {
    let media = spawn(upstream()).await;
    let app = spawn(crate::app(AppState::for_test())).await;

    let resp = relay_get(&app, &format!("{media}/chunked"), "video").await;
    assert_eq!(resp.status(), StatusCode::OK);
    drop(resp);

    let resp = relay_get(&app, &format!("{media}/media"), "video").await;
    assert_eq!(resp.bytes().await.unwrap().len(), 1000);
  }

  #[tokio::test]
  async fn test_private_hosts_refused_by_default() {
    let media = spawn(upstream()).await;
    let state = AppState::new(crate::Config::default()).unwrap();
    let app = spawn(crate::app(state)).await;

    let resp = relay_get(&app, &format!("{media}/media"), "video").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("private address"));
  }

  #[test]
  fn test_private_host_detection() {
    let private = [
      "http://127.0.0.1/a.mp4",
      "http://10.1.2.3/a.mp4",
      "http://192.168.0.10:8080/a.mp4",
      "http://169.254.169.254/latest/meta-data",
      "http://0.0.0.0/",
      "http://localhost:3000/",
      "http://api.localhost/",
      "http://[::1]/",
      "http://[fd00::1]/",
      "http://[fe80::1]/",
      "http://[::ffff:127.0.0.1]/",
    ];
    for url in private {
      assert!(is_private_host(&url.parse().unwrap()), "{url}");
    }

    let public = [
      "https://cdn.example.com/a.mp4",
      "http://93.184.216.34/a.mp4",
      "http://[2606:4700::1]/",
      "https://localhost.example.com/",
    ];
    for url in public {
      assert!(!is_private_host(&url.parse().unwrap()), "{url}");
    }
  }

  #[tokio::test]
  async fn test_bad_query() {
    let app = spawn(crate::app(AppState::for_test())).await;

    let resp = reqwest::get(format!("{app}/api/relay-download"))
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = relay_get(&app, "ftp://example.com/a.mp4", "video").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[test]
  fn test_kind_defaults_to_video() {
    assert_eq!(MediaKind::from_query(Some("audio")), MediaKind::Audio);
    assert_eq!(MediaKind::from_query(Some("AUDIO")), MediaKind::Video);
    assert_eq!(MediaKind::from_query(Some("gif")), MediaKind::Video);
    assert_eq!(MediaKind::from_query(None), MediaKind::Video);
  }
}
