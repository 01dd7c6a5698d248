//! Map resource paths to the injection mechanism that handles them.

use serde::Serialize;

/// Kind of resource, decided from the path suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
  /// `.js` files, loaded as ordered script tags.
  Script,
  /// `.css` files, linked from the document head.
  Stylesheet,
  /// `.tpl` files, fetched and appended to the shared template container.
  TemplateFragment,
  /// Anything else. Skipped without injection.
  Unknown,
}

/// Classify `path` by exact, case-sensitive suffix.
pub fn classify(path: &str) -> ResourceKind {
  if path.ends_with(".js") {
    ResourceKind::Script
  } else if path.ends_with(".css") {
    ResourceKind::Stylesheet
  } else if path.ends_with(".tpl") {
    ResourceKind::TemplateFragment
  } else {
    ResourceKind::Unknown
  }
}
