use http_types::Url;
use rand::seq::SliceRandom;
use reqwest::header::{
  HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE,
  CACHE_CONTROL, ORIGIN, REFERER, USER_AGENT,
};

pub const PLATFORM_ROOT: &str = "https://www.kuaishou.com/";

pub const USER_AGENTS: &[&str] = &[
  "Mozilla/5.0 (iPhone; CPU iPhone OS 16_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Mobile/15E148 Safari/604.1",
  "Mozilla/5.0 (Linux; Android 13; Pixel 7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36",
  "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
  "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
  "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
];

const ACCEPT_VALUE: &str =
  "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGE_VALUE: &str = "zh-CN,zh;q=0.9,en;q=0.8";
const ACCEPT_ENCODING_VALUE: &str = "gzip, deflate, br";
const CACHE_CONTROL_VALUE: &str = "no-cache";

/// A freshly randomized browser-like header set.
///
/// `Referer` defaults to the platform root; `Origin` always follows the
/// scheme and host of whatever referer ends up being sent.
pub fn headers(referer: Option<&str>) -> HeaderMap {
  let user_agent = USER_AGENTS
    .choose(&mut rand::thread_rng())
    .copied()
    .unwrap_or(USER_AGENTS[0]);

  let referer = referer
    .and_then(|r| HeaderValue::from_str(r).ok().map(|v| (r, v)))
    .unwrap_or((PLATFORM_ROOT, HeaderValue::from_static(PLATFORM_ROOT)));

  let mut map = HeaderMap::new();
  map.insert(USER_AGENT, HeaderValue::from_static(user_agent));
  map.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
  map.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE));
  map.insert(ACCEPT_ENCODING, HeaderValue::from_static(ACCEPT_ENCODING_VALUE));
  map.insert(CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL_VALUE));
  if let Some(origin) = origin_of(referer.0) {
    map.insert(ORIGIN, origin);
  }
  map.insert(REFERER, referer.1);
  map
}

fn origin_of(url: &str) -> Option<HeaderValue> {
  let url: Url = url.parse().ok()?;
  let origin = url.origin();
  if !origin.is_tuple() {
    return None;
  }
  HeaderValue::from_str(&origin.ascii_serialization()).ok()
}
