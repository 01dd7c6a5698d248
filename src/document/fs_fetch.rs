//! Fetch template fragments from a directory on disk.

use std::path::PathBuf;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use super::{Fetch, FetchError};

fn remote_url_patterns() -> &'static [Regex] {
  static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
  PATTERNS
    .get_or_init(|| {
      vec![
        Regex::new(r"(?i)^[a-z][a-z0-9+.-]*://").expect("invalid scheme regex"),
        Regex::new(r"^//").expect("invalid protocol-relative regex"),
        Regex::new(r"(?i)^data:").expect("invalid data URI regex"),
      ]
    })
    .as_slice()
}

/// Returns `true` for URLs that cannot be mapped onto the local filesystem.
pub fn is_remote_url(url: &str) -> bool {
  remote_url_patterns().iter().any(|pattern| pattern.is_match(url))
}

/// [`Fetch`] implementation resolving URLs against a root directory.
///
/// Leading slashes are stripped and query strings or fragments are ignored, so
/// `/app/lib/widget.tpl?v=2` reads `<root>/app/lib/widget.tpl`.
#[derive(Debug, Clone)]
pub struct FsFetch {
  root: PathBuf,
}

impl FsFetch {
  /// Serve fragments from `root`.
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  fn local_path(&self, url: &str) -> PathBuf {
    let without_suffix = url
      .split(['?', '#'])
      .next()
      .unwrap_or_default();
    self.root.join(without_suffix.trim_start_matches('/'))
  }
}

#[async_trait]
impl Fetch for FsFetch {
  async fn fetch(&self, url: &str) -> Result<String, FetchError> {
    if is_remote_url(url) {
      return Err(FetchError::Unsupported { url: url.to_string() });
    }

    let path = self.local_path(url);
    tokio::fs::read_to_string(&path)
      .await
      .map_err(|source| FetchError::Io { path, source })
  }
}
