//! Top-level driver run once per page load.

use std::sync::Arc;

use tracing::debug;

use crate::catalog::BundleCatalog;
use crate::config::LoaderConfig;
use crate::document::{Document, Fetch};
use crate::injector::{Injector, LoaderError, PendingTemplates};
use crate::resolver::{
  ResolvedManifest, Resolver, derive_base_path, parse_list, requested_bundles,
};

/// Attribute naming the bundles to load.
pub const LOAD_ATTRIBUTE: &str = "load";
/// Attribute listing verbatim extra resources.
pub const EXTRA_ATTRIBUTE: &str = "extra";
/// Attribute holding the invoking tag's own location.
pub const LOCATION_ATTRIBUTE: &str = "src";

/// Outcome of a bootstrap run.
#[derive(Debug)]
pub struct LoadReport {
  /// Base path derived from the invoking tag.
  pub base_path: String,
  /// Resources that were resolved, in injection order.
  pub manifest: ResolvedManifest,
  /// Template fetches still in flight.
  pub pending: PendingTemplates,
  /// Whether the invoking tag was detached from the document.
  pub invoking_tag_removed: bool,
}

/// Locates the invoking tag, resolves its bundles and removes it afterwards.
#[derive(Debug, Clone)]
pub struct Bootstrap {
  resolver: Resolver,
  marker: String,
  default_bundle: String,
  template_container_id: String,
}

impl Bootstrap {
  /// Build a bootstrap from configuration, using the catalog it describes.
  pub fn new(config: &LoaderConfig) -> Self {
    Self::with_catalog(config, Arc::new(config.catalog()))
  }

  /// Build a bootstrap from configuration with an explicit catalog.
  pub fn with_catalog(config: &LoaderConfig, catalog: Arc<BundleCatalog>) -> Self {
    Self {
      resolver: Resolver::new(catalog),
      marker: config.marker.clone(),
      default_bundle: config.default_bundle.clone(),
      template_container_id: config.template_container_id.clone(),
    }
  }

  /// Run the loader against `document`.
  ///
  /// Only a missing fetch capability is reported as an error. Failing to remove the
  /// invoking tag is ignored.
  pub async fn run(
    &self,
    document: Arc<dyn Document>,
    fetcher: Option<Arc<dyn Fetch>>,
  ) -> Result<LoadReport, LoaderError> {
    let invoking_tag = document.last_script_tag();
    if invoking_tag.is_none() {
      debug!("no invoking tag found, using defaults");
    }
    let attribute =
      |name: &str| invoking_tag.and_then(|node| document.attribute(node, name));

    let load = attribute(LOAD_ATTRIBUTE);
    let extra = attribute(EXTRA_ATTRIBUTE);
    let location = attribute(LOCATION_ATTRIBUTE);

    let requested = requested_bundles(load.as_deref(), &self.default_bundle);
    let extras = parse_list(extra.as_deref());
    let base_path = derive_base_path(location.as_deref(), &self.marker);
    debug!(
      bundles = ?requested,
      extras = ?extras,
      base_path = %base_path,
      "resolving bundles"
    );

    let injector = Injector::new(
      Arc::clone(&document),
      fetcher,
      self.template_container_id.as_str(),
    );
    let (manifest, pending) = self
      .resolver
      .resolve(&requested, &extras, &base_path, &injector)
      .await?;

    let invoking_tag_removed = match invoking_tag {
      Some(node) => match document.remove_node(node) {
        Ok(()) => true,
        Err(err) => {
          debug!(error = %err, "could not remove invoking tag");
          false
        }
      },
      None => false,
    };

    Ok(LoadReport {
      base_path,
      manifest,
      pending,
      invoking_tag_removed,
    })
  }
}
