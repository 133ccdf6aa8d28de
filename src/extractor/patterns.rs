//! Regex scans over the raw page text. Platform markup embeds its state
//! as (often double-escaped) JSON, so URLs are matched as quoted string
//! literals and key/value pairs rather than through a DOM.

use http_types::Url;
use once_cell::sync::Lazy;
use regex::Regex;

use super::unescape;

// a quoted string value; the capture ends at the first quote, escaped or
// not, so a value holding `\"` is cut short there
fn key_pattern(key: &str) -> Regex {
  Regex::new(&format!(r#"\\?"{key}\\?"\s*:\s*\\?"((?:[^"\\]|\\[^"])+)\\?""#))
    .expect("pattern is hard-coded, thus must be valid")
}

fn key_patterns(keys: &[&str]) -> Vec<Regex> {
  keys.iter().map(|key| key_pattern(key)).collect()
}

static BY_AUTHOR_REGEX: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"(?i)\bby\s+@([\w.\-]+)").unwrap());

static AUTHOR_KEYS: Lazy<Vec<Regex>> =
  Lazy::new(|| key_patterns(&["author", "userName", "name"]));

static AUDIO_LITERAL_REGEX: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r#""(https?:[^"\s]+?\.(?:m4a|mp3|aac)(?:\?[^"\s]*?)?)\\?""#)
    .unwrap()
});

static AUDIO_KEYS: Lazy<Vec<Regex>> =
  Lazy::new(|| key_patterns(&["audioUrl", "soundTrack"]));

static MP4_LITERAL_REGEX: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r#""(https?:[^"\s]*?\.mp4[^"\s]*?)\\?""#).unwrap()
});

static VIDEO_KEYS: Lazy<Vec<Regex>> =
  Lazy::new(|| key_patterns(&["videoUrl", "playUrl", "srcNoMark"]));

static M3U8_LITERAL_REGEX: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r#""(https?:[^"\s]*?\.m3u8[^"\s]*?)\\?""#).unwrap()
});

static MANIFEST_KEYS: Lazy<Vec<Regex>> =
  Lazy::new(|| key_patterns(&["hlsPlayUrl"]));

static IMAGE_LITERAL_REGEX: Lazy<Regex> = Lazy::new(|| {
  Regex::new(
    r#"(?i)"(https?:[^"\s]*?(?:cover|poster|thumb)[^"\s]*?\.(?:jpe?g|png|webp|gif)(?:\?[^"\s]*?)?)\\?""#,
  )
  .unwrap()
});

static IMAGE_KEYS: Lazy<Vec<Regex>> =
  Lazy::new(|| key_patterns(&["coverUrl", "posterUrl"]));

fn first_capture(regex: &Regex, haystack: &str) -> Option<String> {
  regex
    .captures_iter(haystack)
    .filter_map(|c| c.get(1))
    .map(|m| m.as_str().trim())
    .find(|s| !s.is_empty())
    .map(str::to_owned)
}

fn first_key_value(regexes: &[Regex], haystack: &str) -> Option<String> {
  regexes.iter().find_map(|re| first_capture(re, haystack))
}

/// Lowercased path of a candidate url. Hosts and queries are left out so a
/// `cover-cdn` host or a `?from=video` query says nothing about the file.
fn media_path(url: &str) -> String {
  let url = unescape(url);
  match Url::parse(&url) {
    Ok(parsed) => parsed.path().to_ascii_lowercase(),
    Err(_) => url.split('?').next().unwrap_or(&url).to_ascii_lowercase(),
  }
}

/// Thumbnails are routinely served from the same paths as the video, so
/// `cover`/`poster` URLs must never be taken for the video itself.
pub fn is_thumbnail_like(url: &str) -> bool {
  let path = media_path(url);
  path.contains("poster") || path.contains("cover")
}

fn is_video_path(url: &str) -> bool {
  media_path(url).contains("video")
}

pub fn author(html: &str) -> Option<String> {
  first_capture(&BY_AUTHOR_REGEX, html)
    .or_else(|| first_key_value(&AUTHOR_KEYS, html))
}

pub fn audio_url(html: &str) -> Option<String> {
  first_capture(&AUDIO_LITERAL_REGEX, html)
    .or_else(|| first_key_value(&AUDIO_KEYS, html))
}

pub fn video_url(html: &str) -> Option<String> {
  let literals: Vec<&str> = MP4_LITERAL_REGEX
    .captures_iter(html)
    .filter_map(|c| c.get(1))
    .map(|m| m.as_str())
    .filter(|url| !is_thumbnail_like(url))
    .collect();

  let literal = literals
    .iter()
    .find(|url| is_video_path(url))
    .or_else(|| literals.first());
  if let Some(url) = literal {
    return Some(url.to_string());
  }

  VIDEO_KEYS.iter().find_map(|re| {
    re.captures_iter(html)
      .filter_map(|c| c.get(1))
      .map(|m| m.as_str().trim())
      .find(|url| !url.is_empty() && !is_thumbnail_like(url))
      .map(str::to_owned)
  })
}

pub fn manifest_url(html: &str) -> Option<String> {
  first_capture(&M3U8_LITERAL_REGEX, html)
    .or_else(|| first_key_value(&MANIFEST_KEYS, html))
}

pub fn thumbnail_url(html: &str) -> Option<String> {
  first_capture(&IMAGE_LITERAL_REGEX, html)
    .or_else(|| first_key_value(&IMAGE_KEYS, html))
}
