//! Loader configuration describing the marker, defaults and an optional catalog override.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::catalog::{BundleCatalog, DEFAULT_BUNDLE};

/// File name searched for by [`LoaderConfig::discover`].
pub const DEFAULT_CONFIG_FILE: &str = "bundle-loader.json";

/// Well-known relative path of the loader's own canonical file.
pub const DEFAULT_MARKER: &str = "lib/core/vtkweb-loader";

/// Identifier of the hidden node that accumulates template fragments.
pub const DEFAULT_TEMPLATE_CONTAINER_ID: &str = "vtk-templates";

/// Discoverable loader configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoaderConfig {
  /// Path fragment located inside the invoking tag's `src` to derive the base path.
  pub marker: String,
  /// Bundle substituted when the `load` attribute names nothing.
  pub default_bundle: String,
  /// Identifier of the hidden template container.
  pub template_container_id: String,
  /// Replacement catalog. The built-in catalog is used when absent.
  pub bundles: Option<BTreeMap<String, Vec<String>>>,
}

impl Default for LoaderConfig {
  fn default() -> Self {
    Self {
      marker: DEFAULT_MARKER.into(),
      default_bundle: DEFAULT_BUNDLE.into(),
      template_container_id: DEFAULT_TEMPLATE_CONTAINER_ID.into(),
      bundles: None,
    }
  }
}

impl LoaderConfig {
  /// Look for [`DEFAULT_CONFIG_FILE`] inside `dir`.
  ///
  /// A missing or unreadable file falls back to the defaults.
  pub fn discover(dir: &Path) -> Self {
    let candidate = dir.join(DEFAULT_CONFIG_FILE);
    Self::load(&candidate).unwrap_or_default()
  }

  /// Read configuration from an explicit JSON file.
  pub fn load(path: &Path) -> Result<Self> {
    let content = fs::read_to_string(path)
      .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content)
      .with_context(|| format!("failed to parse loader configuration {}", path.display()))
  }

  /// Build the catalog this configuration describes.
  pub fn catalog(&self) -> BundleCatalog {
    match &self.bundles {
      Some(bundles) => BundleCatalog::from_entries(
        bundles
          .iter()
          .map(|(name, paths)| (name.clone(), paths.clone())),
      ),
      None => BundleCatalog::builtin(),
    }
  }
}
