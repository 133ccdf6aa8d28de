use http_types::Url;
use reqwest::{header, header::HeaderMap, redirect, Response, StatusCode};
use tracing::debug;

use crate::{headers, Error, Result};

/// In-flight state of one logical fetch. Lives only for the duration of
/// [`Fetcher::fetch`].
#[derive(Debug)]
struct FetchAttempt {
  url: Url,
  hops: usize,
  headers: HeaderMap,
}

impl FetchAttempt {
  fn new(url: Url) -> Self {
    Self {
      url,
      hops: 0,
      headers: headers::headers(None),
    }
  }

  /// Move on to `location`. Returns false when it cannot be resolved
  /// against the current url, leaving the attempt untouched.
  fn advance(&mut self, location: &str) -> bool {
    // join() leaves absolute locations untouched
    let Ok(next) = self.url.join(location) else {
      debug!(url = %self.url, %location, "unusable redirect target");
      return false;
    };
    self.url = next;
    self.hops += 1;
    self.headers = headers::headers(None);
    true
  }
}

pub struct FetchedPage {
  pub url: Url,
  pub status: StatusCode,
  pub body: String,
}

#[derive(Clone)]
pub struct Fetcher {
  client: reqwest::Client,
  max_redirects: usize,
}

impl Fetcher {
  pub fn new(max_redirects: usize) -> Result<Self> {
    // redirects are followed by hand so every hop gets fresh headers
    let client = reqwest::Client::builder()
      .redirect(redirect::Policy::none())
      .build()?;

    Ok(Self {
      client,
      max_redirects,
    })
  }

  /// Issue up to `max_redirects` requests, following 3xx responses that
  /// carry a `Location`. The last response obtained is returned as is,
  /// even when it is itself a redirect or its `Location` is unusable.
  pub async fn fetch(
    &self,
    url: &str,
    max_redirects: usize,
  ) -> Result<Response> {
    let url: Url = url
      .parse()
      .map_err(|_| Error::unsupported_url(url, "not an absolute url"))?;
    let mut attempt = FetchAttempt::new(url);
    let mut last = None;

    while attempt.hops < max_redirects {
      let resp = self
        .client
        .get(attempt.url.clone())
        .headers(attempt.headers.clone())
        .send()
        .await?;

      let status = resp.status();
      debug!(url = %attempt.url, hop = attempt.hops, %status, "fetched");

      let location = status
        .is_redirection()
        .then(|| resp.headers().get(header::LOCATION))
        .flatten()
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

      last = Some(resp);
      match location {
        Some(location) if attempt.advance(&location) => {}
        _ => break,
      }
    }

    last.ok_or_else(|| Error::NoResponse(attempt.url.to_string()))
  }

  pub async fn fetch_page(&self, url: &str) -> Result<FetchedPage> {
    let resp = self.fetch(url, self.max_redirects).await?;
    let status = resp.status();
    let url = resp.url().clone();
    let body = resp.text().await?;

    Ok(FetchedPage { url, status, body })
  }
}
