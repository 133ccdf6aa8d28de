use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

// "<title> - 快手", "<title> | Kuaishou短视频", ...
static PLATFORM_SUFFIX_REGEX: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"(?i)\s*[-|–—_·]\s*(?:快手|kuaishou)[^-|–—_·]*$").unwrap()
});

/// A fetched document, parsed once up front so every strategy in the
/// cascade can share the result.
pub struct Page<'a> {
  pub html: &'a str,
  pub title: Option<String>,
  meta: Vec<(String, String)>,
}

impl<'a> Page<'a> {
  pub fn parse(html: &'a str) -> Self {
    let (title, meta) = match tl::parse(html, tl::ParserOptions::default()) {
      Ok(dom) => (title_of(&dom), meta_of(&dom)),
      Err(e) => {
        debug!("html not parsable, regex strategies only: {e}");
        (None, Vec::new())
      }
    };

    Self { html, title, meta }
  }

  /// Content of the first non-empty `<meta>` named by `keys`, tried in
  /// order. Both `property=` and `name=` are accepted.
  pub fn meta(&self, keys: &[&str]) -> Option<&str> {
    keys.iter().find_map(|key| {
      self
        .meta
        .iter()
        .find(|(k, v)| k.eq_ignore_ascii_case(key) && !v.is_empty())
        .map(|(_, v)| v.as_str())
    })
  }
}

fn title_of(dom: &tl::VDom<'_>) -> Option<String> {
  let parser = dom.parser();
  let node = dom.query_selector("title")?.next()?.get(parser)?;
  let title = decode_entities(node.inner_text(parser).trim());
  let title = PLATFORM_SUFFIX_REGEX.replace(&title, "");
  let title = title.trim();

  (!title.is_empty()).then(|| title.to_owned())
}

fn meta_of(dom: &tl::VDom<'_>) -> Vec<(String, String)> {
  let parser = dom.parser();
  let Some(nodes) = dom.query_selector("meta[content]") else {
    return Vec::new();
  };

  nodes
    .filter_map(|handle| handle.get(parser)?.as_tag())
    .filter_map(|tag| {
      let attrs = tag.attributes();
      let key = attrs
        .get("property")
        .flatten()
        .or_else(|| attrs.get("name").flatten())?
        .as_utf8_str()
        .trim()
        .to_owned();
      let content = attrs.get("content").flatten()?.as_utf8_str();
      Some((key, decode_entities(content.trim())))
    })
    .collect()
}

/// `tl` hands attribute values and text back undecoded.
pub fn decode_entities(s: &str) -> String {
  if !s.contains('&') {
    return s.to_owned();
  }

  s.replace("&quot;", "\"")
    .replace("&#39;", "'")
    .replace("&#x27;", "'")
    .replace("&lt;", "<")
    .replace("&gt;", ">")
    .replace("&amp;", "&")
}
