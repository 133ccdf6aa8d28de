use axum::{
  extract::{rejection::JsonRejection, State},
  Json,
};
use http_types::Url;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
  descriptor::MediaDescriptor, extractor, AppState, Error, Result,
};

#[derive(Deserialize)]
pub struct ResolveReq {
  url: String,
}

#[derive(Debug, Serialize)]
pub struct ResolveResp {
  success: bool,
  data: MediaDescriptor,
}

pub async fn resolve_video(
  State(state): State<AppState>,
  req: Result<Json<ResolveReq>, JsonRejection>,
) -> Result<Json<ResolveResp>> {
  let Json(req) = req.map_err(|e| Error::Validation(e.body_text()))?;
  let url = validate_url(&req.url, &state.config.platform_domain)?;

  let data = resolve(&state, url.as_str()).await?;
  Ok(Json(ResolveResp {
    success: true,
    data,
  }))
}

pub async fn resolve(state: &AppState, url: &str) -> Result<MediaDescriptor> {
  let page = state.fetcher.fetch_page(url).await?;
  info!(%url, final_url = %page.url, status = %page.status, "page fetched");

  let descriptor = extractor::extract(&page.body, url).ok_or(Error::NotFound)?;
  info!(%url, video_url = %descriptor.video_url, "resolved");

  Ok(descriptor)
}

/// Accept only absolute http(s) urls on `domain` or one of its
/// subdomains.
pub fn validate_url(raw: &str, domain: &str) -> Result<Url> {
  let raw = raw.trim();
  let url: Url = raw
    .parse()
    .map_err(|_| Error::unsupported_url(raw, "not an absolute url"))?;

  if !matches!(url.scheme(), "http" | "https") {
    return Err(Error::unsupported_url(raw, "not http(s)"));
  }

  let host = url
    .host_str()
    .ok_or_else(|| Error::unsupported_url(raw, "no host"))?
    .trim_end_matches('.')
    .to_ascii_lowercase();
  let on_platform =
    host == domain || host.ends_with(&format!(".{domain}"));
  if !on_platform {
    return Err(Error::unsupported_url(raw, "not a platform url"));
  }

  Ok(url)
}
