use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

static JSON_SCRIPT_REGEX: Lazy<Regex> = Lazy::new(|| {
  Regex::new(
    r#"(?is)<script\b[^>]*\btype\s*=\s*["']application/(?:ld\+)?json["'][^>]*>(.*?)</script>"#,
  )
  .unwrap()
});

#[derive(Debug, Default, PartialEq, Eq)]
pub struct StructuredData {
  pub title: Option<String>,
  pub thumbnail: Option<String>,
  pub video: Option<String>,
  pub author: Option<String>,
}

/// Scan every embedded JSON / JSON-LD block. Blocks that fail to parse are
/// skipped; the first value seen for each field is kept.
pub fn scan(html: &str) -> StructuredData {
  let mut data = StructuredData::default();

  for (i, block) in JSON_SCRIPT_REGEX
    .captures_iter(html)
    .filter_map(|c| c.get(1))
    .enumerate()
  {
    let value: Value = match serde_json::from_str(block.as_str().trim()) {
      Ok(value) => value,
      Err(e) => {
        debug!(block = i, "skipping unparsable json block: {e}");
        continue;
      }
    };

    for item in items(&value) {
      merge(&mut data, item);
    }
  }

  data
}

// a block may hold one object, an array of them, or an @graph list
fn items(value: &Value) -> Vec<&Value> {
  let roots: Vec<&Value> = match value {
    Value::Array(values) => values.iter().collect(),
    value => vec![value],
  };

  let mut items = Vec::new();
  for root in roots {
    items.push(root);
    if let Some(Value::Array(graph)) = root.get("@graph") {
      items.extend(graph.iter());
    }
  }

  items.retain(|item| item.is_object());
  items
}

fn merge(data: &mut StructuredData, item: &Value) {
  fill(&mut data.video, string_of(item.get("contentUrl")));
  fill(&mut data.thumbnail, string_of(item.get("thumbnailUrl")));
  fill(&mut data.title, string_of(item.get("name")));

  let author = match item.get("author") {
    Some(Value::Array(authors)) => authors.first(),
    author => author,
  };
  fill(&mut data.author, string_of(author.and_then(|a| a.get("name"))));
}

fn fill(slot: &mut Option<String>, value: Option<&str>) {
  if slot.is_none() {
    *slot = value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_owned);
  }
}

// strings as is, lists by their first string entry
fn string_of(value: Option<&Value>) -> Option<&str> {
  match value? {
    Value::String(s) => Some(s),
    Value::Array(values) => values.iter().find_map(Value::as_str),
    _ => None,
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_ld_json() {
    let html = r#"
      <script type="application/ld+json">
        {"@type":"VideoObject","name":"Clip","contentUrl":"https://a/v.mp4",
         "thumbnailUrl":["https://a/t.jpg"],"author":{"name":"Ann"}}
      </script>"#;

    assert_eq!(
      scan(html),
      StructuredData {
        title: Some("Clip".into()),
        thumbnail: Some("https://a/t.jpg".into()),
        video: Some("https://a/v.mp4".into()),
        author: Some("Ann".into()),
      }
    );
  }

  #[test]
  fn test_broken_block_does_not_stop_scan() {
    let html = r#"
      <script type="application/json">{ not json </script>
      <script type='application/json'>
        [{"name":"First"},{"name":"Second","contentUrl":"https://a/v.mp4"}]
      </script>"#;

    let data = scan(html);
    assert_eq!(data.title.as_deref(), Some("First"));
    assert_eq!(data.video.as_deref(), Some("https://a/v.mp4"));
  }

  #[test]
  fn test_graph_and_other_scripts() {
    let html = r#"
      <script>var x = {"contentUrl":"https://ignored/v.mp4"};</script>
      <script type="application/ld+json">
        {"@context":"https://schema.org","@graph":[
          {"@type":"WebPage"},
          {"@type":"VideoObject","contentUrl":"https://a/g.mp4",
           "author":[{"name":"Bo"}]}
        ]}
      </script>"#;

    let data = scan(html);
    assert_eq!(data.video.as_deref(), Some("https://a/g.mp4"));
    assert_eq!(data.author.as_deref(), Some("Bo"));
    assert_eq!(data.title, None);
  }
}
