mod page;
mod patterns;
mod structured;

use http_types::Url;

use crate::descriptor::{
  MediaDescriptor, DEFAULT_AUTHOR, DEFAULT_QUALITY, DEFAULT_TITLE,
};

use page::Page;

/// Fields gathered so far. Each step of the cascade may only fill what
/// earlier steps left empty.
#[derive(Debug, Default)]
struct Draft {
  title: Option<String>,
  author: Option<String>,
  thumbnail: Option<String>,
  video_url: Option<String>,
  audio_url: Option<String>,
}

fn fill(slot: &mut Option<String>, value: Option<impl AsRef<str>>) {
  if slot.is_some() {
    return;
  }
  let value = value.map(|v| v.as_ref().trim().to_owned());
  *slot = value.filter(|v| !v.is_empty());
}

type Step = fn(Draft, &Page<'_>) -> Draft;

const CASCADE: &[Step] = &[
  title,
  og_thumbnail,
  og_video,
  author,
  structured_data,
  audio,
  video_fallback,
  manifest_fallback,
  thumbnail_fallback,
];

/// Run the cascade over `html`. `None` means no playable video was found,
/// whatever else the page revealed.
pub fn extract(html: &str, original_url: &str) -> Option<MediaDescriptor> {
  let page = Page::parse(html);
  CASCADE
    .iter()
    .fold(Draft::default(), |draft, step| step(draft, &page))
    .finish(original_url)
}

fn title(mut draft: Draft, page: &Page<'_>) -> Draft {
  // og:title is curated, <title> is SEO boilerplate
  fill(&mut draft.title, page.meta(&["og:title"]));
  fill(&mut draft.title, page.title.as_deref());
  draft
}

fn og_thumbnail(mut draft: Draft, page: &Page<'_>) -> Draft {
  fill(&mut draft.thumbnail, page.meta(&["og:image"]));
  draft
}

fn og_video(mut draft: Draft, page: &Page<'_>) -> Draft {
  fill(&mut draft.video_url, page.meta(&["og:video", "og:video:url"]));
  draft
}

fn author(mut draft: Draft, page: &Page<'_>) -> Draft {
  if draft.author.is_none() {
    fill(&mut draft.author, patterns::author(page.html));
  }
  draft
}

fn structured_data(mut draft: Draft, page: &Page<'_>) -> Draft {
  let data = structured::scan(page.html);
  fill(&mut draft.title, data.title);
  fill(&mut draft.thumbnail, data.thumbnail);
  fill(&mut draft.video_url, data.video);
  fill(&mut draft.author, data.author);
  draft
}

fn audio(mut draft: Draft, page: &Page<'_>) -> Draft {
  if draft.audio_url.is_none() {
    fill(&mut draft.audio_url, patterns::audio_url(page.html));
  }
  draft
}

fn video_fallback(mut draft: Draft, page: &Page<'_>) -> Draft {
  if draft.video_url.is_none() {
    fill(&mut draft.video_url, patterns::video_url(page.html));
  }
  draft
}

fn manifest_fallback(mut draft: Draft, page: &Page<'_>) -> Draft {
  if draft.video_url.is_none() {
    fill(&mut draft.video_url, patterns::manifest_url(page.html));
  }
  draft
}

fn thumbnail_fallback(mut draft: Draft, page: &Page<'_>) -> Draft {
  if draft.thumbnail.is_none() {
    fill(&mut draft.thumbnail, patterns::thumbnail_url(page.html));
  }
  draft
}

impl Draft {
  fn finish(self, original_url: &str) -> Option<MediaDescriptor> {
    let base: Option<Url> = original_url.parse().ok();
    let media = |url: String| absolutize(&unescape(&url), base.as_ref());

    let video_url = self.video_url.map(media).filter(|u| !u.is_empty())?;

    Some(MediaDescriptor {
      title: self.title.unwrap_or_else(|| DEFAULT_TITLE.to_owned()),
      author: self.author.unwrap_or_else(|| DEFAULT_AUTHOR.to_owned()),
      thumbnail: self.thumbnail.map(media).unwrap_or_default(),
      video_url,
      audio_url: self.audio_url.map(media).filter(|u| !u.is_empty()),
      quality: DEFAULT_QUALITY.to_owned(),
      file_size: String::new(),
    })
  }
}

/// Undo the JSON escaping platform pages apply to embedded URLs, often
/// twice over.
pub fn unescape(url: &str) -> String {
  url
    .replace("\\u002F", "/")
    .replace("\\u002f", "/")
    .replace('\\', "")
}

// "//host/x" and "/x" are taken relative to the page they came from
fn absolutize(url: &str, base: Option<&Url>) -> String {
  let relative = url.starts_with('/');
  match base {
    Some(base) if relative => base
      .join(url)
      .map(String::from)
      .unwrap_or_else(|_| url.to_owned()),
    _ => url.to_owned(),
  }
}
