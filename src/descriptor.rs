use serde::Serialize;

pub const DEFAULT_TITLE: &str = "Kuaishou Video";
pub const DEFAULT_AUTHOR: &str = "Unknown Author";
pub const DEFAULT_QUALITY: &str = "HD";

/// Normalized result of a successful extraction. `video_url` is never
/// empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDescriptor {
  pub title: String,
  pub author: String,
  pub thumbnail: String,
  pub video_url: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub audio_url: Option<String>,
  pub quality: String,
  pub file_size: String,
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_serializes_camel_case() {
    let descriptor = MediaDescriptor {
      title: "t".into(),
      author: "a".into(),
      thumbnail: String::new(),
      video_url: "https://cdn.example.com/v.mp4".into(),
      audio_url: None,
      quality: DEFAULT_QUALITY.into(),
      file_size: String::new(),
    };

    let value = serde_json::to_value(&descriptor).unwrap();
    assert_eq!(value["videoUrl"], "https://cdn.example.com/v.mp4");
    assert_eq!(value["fileSize"], "");
    assert!(value.get("audioUrl").is_none());
  }
}
