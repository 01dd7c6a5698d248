//! Expand requested bundles into an ordered manifest and drive the injector over it.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::catalog::BundleCatalog;
use crate::classify::{ResourceKind, classify};
use crate::injector::{Injector, LoaderError, PendingTemplates};

/// One resource to inject, with the kind that decides how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
  /// Path as it will be requested, base path already applied for bundle resources.
  pub path: String,
  /// Resource kind derived from the path suffix.
  pub kind: ResourceKind,
}

impl ManifestEntry {
  fn new(path: String) -> Self {
    let kind = classify(&path);
    Self { path, kind }
  }
}

/// Ordered resources for one page load. Duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResolvedManifest {
  entries: Vec<ManifestEntry>,
}

impl ResolvedManifest {
  /// Entries in injection order.
  pub fn entries(&self) -> &[ManifestEntry] {
    &self.entries
  }

  /// Paths in injection order.
  pub fn paths(&self) -> Vec<&str> {
    self.entries.iter().map(|entry| entry.path.as_str()).collect()
  }

  /// Number of entries.
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  /// Returns `true` when nothing resolved.
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

/// Split a comma separated attribute into trimmed, non-empty items.
///
/// An absent attribute yields an empty list.
pub fn parse_list(raw: Option<&str>) -> Vec<String> {
  raw
    .map(|value| {
      value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
    })
    .unwrap_or_default()
}

/// Bundle names from the `load` attribute, falling back to `default_bundle` when none remain.
pub fn requested_bundles(raw: Option<&str>, default_bundle: &str) -> Vec<String> {
  let names = parse_list(raw);
  if names.is_empty() {
    debug!(bundle = %default_bundle, "no bundles requested, using default");
    return vec![default_bundle.to_string()];
  }
  names
}

/// Prefix of `location` before the last occurrence of `marker`.
///
/// Returns an empty string when the location is absent or does not contain the marker.
pub fn derive_base_path(location: Option<&str>, marker: &str) -> String {
  location
    .and_then(|location| {
      location
        .rfind(marker)
        .map(|index| location[..index].to_string())
    })
    .unwrap_or_default()
}

/// Expands bundle names through a shared, immutable catalog.
#[derive(Debug, Clone)]
pub struct Resolver {
  catalog: Arc<BundleCatalog>,
}

impl Resolver {
  /// Create a resolver reading from `catalog`.
  pub fn new(catalog: Arc<BundleCatalog>) -> Self {
    Self { catalog }
  }

  /// Expand `requested` bundles (prefixed with `base_path`) followed by `extras` verbatim.
  pub fn manifest(
    &self,
    requested: &[String],
    extras: &[String],
    base_path: &str,
  ) -> ResolvedManifest {
    let mut entries = Vec::new();

    for name in requested {
      let paths = self.catalog.lookup(name);
      if paths.is_empty() && !self.catalog.contains(name) {
        debug!(bundle = %name, "ignoring unknown bundle");
        continue;
      }
      entries.extend(
        paths
          .iter()
          .map(|path| ManifestEntry::new(format!("{base_path}{path}"))),
      );
    }

    entries.extend(extras.iter().cloned().map(ManifestEntry::new));

    ResolvedManifest { entries }
  }

  /// Resolve the manifest and inject every entry in order.
  ///
  /// Scripts are awaited one after another; template fetches are left running and
  /// returned as [`PendingTemplates`].
  pub async fn resolve(
    &self,
    requested: &[String],
    extras: &[String],
    base_path: &str,
    injector: &Injector,
  ) -> Result<(ResolvedManifest, PendingTemplates), LoaderError> {
    let manifest = self.manifest(requested, extras, base_path);
    let mut pending = PendingTemplates::default();

    for entry in manifest.entries() {
      injector.inject(entry, &mut pending).await?;
    }

    Ok((manifest, pending))
  }
}
