//! Named bundle profiles and the resource paths each one expands to.

use std::collections::BTreeMap;

/// Bundle requested when the invoking tag does not name any.
pub const DEFAULT_BUNDLE: &str = "all-min";

// Aggregates (`all`, `all-min`) are authored as flat lists and must be kept in sync with the
// single-purpose profiles by hand.
const BUILTIN_BUNDLES: &[(&str, &[&str])] = &[
  (
    "core-min",
    &[
      "ext/core/jquery-1.8.3.min.js",
      "ext/core/autobahn.min.js",
      "lib/core/vtkweb-all.min.js",
    ],
  ),
  (
    "core",
    &[
      "ext/core/jquery-1.8.3.min.js",
      "ext/core/autobahn.js",
      "lib/core/vtkweb-all.js",
    ],
  ),
  ("webgl-min", &["ext/core/gl-matrix-min.js"]),
  ("webgl", &["ext/core/gl-matrix.js"]),
  ("mobile-min", &["ext/core/jquery.hammer.min.js"]),
  ("mobile", &["ext/core/jquery.hammer.js"]),
  (
    "all",
    &[
      "ext/core/jquery-1.8.3.min.js",
      "ext/core/autobahn.js",
      "ext/core/gl-matrix.js",
      "ext/core/jquery.hammer.js",
      "lib/core/vtkweb-all.js",
    ],
  ),
  (
    "all-min",
    &[
      "ext/core/jquery-1.8.3.min.js",
      "ext/core/autobahn.min.js",
      "ext/core/gl-matrix-min.js",
      "ext/core/jquery.hammer.min.js",
      "lib/core/vtkweb-all.min.js",
    ],
  ),
  (
    "bootstrap",
    &[
      "ext/bootstrap/js/bootstrap.min.js",
      "ext/bootstrap/css/bootstrap-responsive.min.css",
      "ext/bootstrap/css/bootstrap.min.css",
    ],
  ),
  (
    "fontello",
    &["ext/fontello/css/animation.css", "ext/fontello/css/fontello.css"],
  ),
  ("color", &["ext/jscolor/jscolor.js"]),
  (
    "filebrowser",
    &[
      "ext/pure/pure.min.js",
      "lib/widgets/FileBrowser/vtkweb-widget-filebrowser.js",
      "lib/widgets/FileBrowser/vtkweb-widget-filebrowser.tpl",
      "lib/widgets/FileBrowser/vtkweb-widget-filebrowser.css",
    ],
  ),
];

/// Immutable mapping from bundle name to the ordered list of base-relative resource paths.
///
/// The catalog is built once and shared by reference; nothing mutates it after construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleCatalog {
  bundles: BTreeMap<String, Vec<String>>,
}

impl BundleCatalog {
  /// Reference catalog shipped with the loader.
  pub fn builtin() -> Self {
    Self::from_entries(BUILTIN_BUNDLES.iter().map(|(name, paths)| {
      (
        name.to_string(),
        paths.iter().map(|path| path.to_string()).collect::<Vec<_>>(),
      )
    }))
  }

  /// Build a catalog from explicit `(name, paths)` pairs.
  ///
  /// A name listed twice keeps the last list supplied for it.
  pub fn from_entries<N, P>(entries: impl IntoIterator<Item = (N, P)>) -> Self
  where
    N: Into<String>,
    P: IntoIterator,
    P::Item: Into<String>,
  {
    let bundles: BTreeMap<String, Vec<String>> = entries
      .into_iter()
      .map(|(name, paths)| (name.into(), paths.into_iter().map(Into::into).collect()))
      .collect();
    Self { bundles }
  }

  /// Resource paths for `name`, in catalog order. Unknown names yield an empty slice.
  pub fn lookup(&self, name: &str) -> &[String] {
    self
      .bundles
      .get(name)
      .map(Vec::as_slice)
      .unwrap_or_default()
  }

  /// Returns `true` when `name` is a known bundle.
  pub fn contains(&self, name: &str) -> bool {
    self.bundles.contains_key(name)
  }

  /// Known bundle names in sorted order.
  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.bundles.keys().map(String::as_str)
  }

  /// Iterate over every bundle and its paths, sorted by name.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
    self
      .bundles
      .iter()
      .map(|(name, paths)| (name.as_str(), paths.as_slice()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builtin_catalog_contains_reference_profiles() {
    let catalog = BundleCatalog::builtin();
    let names: Vec<&str> = catalog.names().collect();

    assert_eq!(names, vec![
      "all",
      "all-min",
      "bootstrap",
      "color",
      "core",
      "core-min",
      "filebrowser",
      "fontello",
      "mobile",
      "mobile-min",
      "webgl",
      "webgl-min",
    ]);
    assert!(catalog.contains(DEFAULT_BUNDLE));
  }

  #[test]
  fn lookup_preserves_catalog_order() {
    let catalog = BundleCatalog::builtin();

    assert_eq!(catalog.lookup("core"), [
      "ext/core/jquery-1.8.3.min.js",
      "ext/core/autobahn.js",
      "lib/core/vtkweb-all.js",
    ]);
    assert_eq!(catalog.lookup("webgl"), ["ext/core/gl-matrix.js"]);
  }

  #[test]
  fn unknown_bundle_is_empty() {
    let catalog = BundleCatalog::builtin();
    assert!(catalog.lookup("does-not-exist").is_empty());
    assert!(!catalog.contains("does-not-exist"));
  }

  #[test]
  fn aggregate_lists_match_single_purpose_profiles() {
    let catalog = BundleCatalog::builtin();

    for (aggregate, parts) in [
      ("all-min", ["core-min", "webgl-min", "mobile-min"]),
      ("all", ["core", "webgl", "mobile"]),
    ] {
      let aggregate_paths = catalog.lookup(aggregate);
      for part in parts {
        for path in catalog.lookup(part) {
          assert!(
            aggregate_paths.contains(path),
            "{aggregate} is missing {path} from {part}"
          );
        }
      }
    }
  }

  #[test]
  fn from_entries_keeps_last_definition() {
    let catalog = BundleCatalog::from_entries(vec![
      ("widgets", vec!["a.js"]),
      ("widgets", vec!["b.js", "c.css"]),
    ]);

    assert_eq!(catalog.lookup("widgets"), ["b.js", "c.css"]);
  }
}
