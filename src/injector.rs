//! Injection strategies for scripts, stylesheets and template fragments.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::classify::ResourceKind;
use crate::document::{Document, Fetch};
use crate::resolver::ManifestEntry;

/// Errors that escape resolution. Every other condition degrades to an omission.
#[derive(Debug)]
pub enum LoaderError {
  /// No fetch capability is available to retrieve a template fragment.
  Capability {
    /// Fragment whose fetch could not be issued.
    url: String,
  },
}

impl std::fmt::Display for LoaderError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Capability { url } => {
        write!(f, "could not create an HTTP request to fetch {url}")
      }
    }
  }
}

impl std::error::Error for LoaderError {}

/// Handles of template fetches still in flight.
///
/// Dropping the collection abandons the fetches; they keep running until the runtime
/// shuts down and no result is observed.
#[derive(Debug, Default)]
pub struct PendingTemplates {
  handles: Vec<JoinHandle<()>>,
}

impl PendingTemplates {
  /// Number of fetches issued.
  pub fn len(&self) -> usize {
    self.handles.len()
  }

  /// Returns `true` when no template fetch was issued.
  pub fn is_empty(&self) -> bool {
    self.handles.is_empty()
  }

  /// Wait until every issued fetch has completed and appended its text.
  pub async fn settle(self) {
    for handle in self.handles {
      if let Err(err) = handle.await {
        warn!(error = %err, "template fetch task did not complete");
      }
    }
  }

  fn push(&mut self, handle: JoinHandle<()>) {
    self.handles.push(handle);
  }
}

/// Applies manifest entries to a [`Document`].
pub struct Injector {
  document: Arc<dyn Document>,
  fetcher: Option<Arc<dyn Fetch>>,
  container_id: String,
  append_lock: Arc<Mutex<()>>,
}

impl Injector {
  /// Create an injector writing into `document`.
  ///
  /// `fetcher` is the transport for template fragments. Without one, the first template
  /// fragment fails with [`LoaderError::Capability`].
  pub fn new(
    document: Arc<dyn Document>,
    fetcher: Option<Arc<dyn Fetch>>,
    container_id: impl Into<String>,
  ) -> Self {
    Self {
      document,
      fetcher,
      container_id: container_id.into(),
      append_lock: Arc::new(Mutex::new(())),
    }
  }

  /// Route `entry` to the strategy matching its kind.
  ///
  /// Template fetches are spawned and recorded in `pending`; this call never waits for them.
  pub async fn inject(
    &self,
    entry: &ManifestEntry,
    pending: &mut PendingTemplates,
  ) -> Result<(), LoaderError> {
    match entry.kind {
      ResourceKind::Script => self.inject_script(&entry.path).await,
      ResourceKind::Stylesheet => self.inject_stylesheet(&entry.path),
      ResourceKind::TemplateFragment => {
        pending.push(self.inject_template_fragment(&entry.path)?);
      }
      ResourceKind::Unknown => trace!(path = %entry.path, "skipping resource with unknown type"),
    }
    Ok(())
  }

  /// Emit a script tag and wait for it to become ready.
  ///
  /// A script that fails to load does not stop the scripts after it.
  pub async fn inject_script(&self, url: &str) {
    debug!(path = %url, "loading script");
    if let Err(err) = self.document.load_script(url).await {
      warn!(path = %url, error = %err, "script failed to load");
    }
  }

  /// Link a stylesheet from the document head.
  pub fn inject_stylesheet(&self, url: &str) {
    debug!(path = %url, "linking stylesheet");
    if let Err(err) = self.document.append_stylesheet(url) {
      warn!(path = %url, error = %err, "failed to link stylesheet");
    }
  }

  /// Start fetching a template fragment and return without waiting for it.
  ///
  /// The container is created on first use. The fetched text is appended once the
  /// fetch completes, in completion order.
  pub fn inject_template_fragment(&self, url: &str) -> Result<JoinHandle<()>, LoaderError> {
    self.ensure_container();

    let fetcher = self
      .fetcher
      .clone()
      .ok_or_else(|| LoaderError::Capability {
        url: url.to_string(),
      })?;
    let document = Arc::clone(&self.document);
    let append_lock = Arc::clone(&self.append_lock);
    let container_id = self.container_id.clone();
    let url = url.to_string();

    debug!(path = %url, "fetching template fragment");
    Ok(tokio::spawn(async move {
      let text = match fetcher.fetch(&url).await {
        Ok(text) => text,
        Err(err) => {
          warn!(path = %url, error = %err, "template fragment fetch failed");
          return;
        }
      };

      let _guard = append_lock.lock().await;
      let mut content = document.container_content(&container_id).unwrap_or_default();
      content.push_str(&text);
      if let Err(err) = document.set_container_content(&container_id, content) {
        warn!(path = %url, error = %err, "failed to append template fragment");
      }
    }))
  }

  fn ensure_container(&self) {
    if self.document.has_container(&self.container_id) {
      return;
    }
    trace!(id = %self.container_id, "creating template container");
    if let Err(err) = self.document.create_hidden_container(&self.container_id) {
      warn!(id = %self.container_id, error = %err, "failed to create template container");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::classify::classify;
  use crate::document::page::HtmlPage;
  use crate::testing::{Event, GatedFetch, RecordingDocument, wait_for};

  fn entry(path: &str) -> ManifestEntry {
    ManifestEntry {
      path: path.to_string(),
      kind: classify(path),
    }
  }

  #[tokio::test]
  async fn routes_each_kind_to_one_strategy() {
    let document = Arc::new(RecordingDocument::default());
    let fetch = Arc::new(GatedFetch::ready([("c.tpl", "<i>c</i>")]));
    let injector = Injector::new(document.clone(), Some(fetch), "templates");
    let mut pending = PendingTemplates::default();

    for path in ["a.js", "b.css", "c.tpl", "d.txt"] {
      injector.inject(&entry(path), &mut pending).await.unwrap();
    }
    assert_eq!(pending.len(), 1);
    pending.settle().await;

    assert_eq!(document.events(), vec![
      Event::Script("a.js".into()),
      Event::Stylesheet("b.css".into()),
      Event::ContainerCreated("templates".into()),
    ]);
    assert_eq!(document.container("templates").as_deref(), Some("<i>c</i>"));
  }

  #[tokio::test]
  async fn out_of_order_completions_share_one_container() {
    let document = Arc::new(RecordingDocument::default());
    let fetch = Arc::new(GatedFetch::default());
    let first = fetch.gate("first.tpl");
    let second = fetch.gate("second.tpl");
    let injector = Injector::new(document.clone(), Some(fetch), "templates");
    let mut pending = PendingTemplates::default();

    injector.inject(&entry("first.tpl"), &mut pending).await.unwrap();
    injector.inject(&entry("second.tpl"), &mut pending).await.unwrap();

    second.send("[second]".into()).unwrap();
    wait_for(|| document.container("templates").as_deref() == Some("[second]")).await;
    first.send("[first]".into()).unwrap();
    pending.settle().await;

    assert_eq!(document.container("templates").as_deref(), Some("[second][first]"));
    let created = document
      .events()
      .into_iter()
      .filter(|event| matches!(event, Event::ContainerCreated(_)))
      .count();
    assert_eq!(created, 1);
  }

  #[tokio::test]
  async fn missing_fetch_capability_is_fatal() {
    let document = Arc::new(RecordingDocument::default());
    let injector = Injector::new(document, None, "templates");
    let mut pending = PendingTemplates::default();

    injector.inject(&entry("a.js"), &mut pending).await.unwrap();
    let err = injector
      .inject(&entry("widget.tpl"), &mut pending)
      .await
      .unwrap_err();

    assert!(matches!(err, LoaderError::Capability { ref url } if url == "widget.tpl"));
    assert!(pending.is_empty());
  }

  #[tokio::test]
  async fn failed_fetch_appends_nothing() {
    let document = Arc::new(RecordingDocument::default());
    let fetch = Arc::new(GatedFetch::ready([("ok.tpl", "ok")]));
    let injector = Injector::new(document.clone(), Some(fetch), "templates");
    let mut pending = PendingTemplates::default();

    injector.inject(&entry("missing.tpl"), &mut pending).await.unwrap();
    injector.inject(&entry("ok.tpl"), &mut pending).await.unwrap();
    pending.settle().await;

    assert_eq!(document.container("templates").as_deref(), Some("ok"));
  }

  #[tokio::test]
  async fn failing_script_does_not_stop_later_entries() {
    let document = Arc::new(RecordingDocument::default().failing_script("broken.js"));
    let injector = Injector::new(document.clone(), None, "templates");
    let mut pending = PendingTemplates::default();

    for path in ["broken.js", "next.js"] {
      injector.inject(&entry(path), &mut pending).await.unwrap();
    }

    assert_eq!(document.events(), vec![
      Event::Script("broken.js".into()),
      Event::Script("next.js".into()),
    ]);
  }

  #[tokio::test]
  async fn fragment_is_dropped_when_container_cannot_be_created() {
    let page = Arc::new(HtmlPage::parse("<script src=\"loader.js\"></script>"));
    let fetch = Arc::new(GatedFetch::ready([("widget.tpl", "<b>widget</b>")]));
    let injector = Injector::new(page.clone(), Some(fetch), "templates");
    let mut pending = PendingTemplates::default();

    injector.inject(&entry("widget.tpl"), &mut pending).await.unwrap();
    assert_eq!(pending.len(), 1);
    pending.settle().await;

    assert!(!page.has_container("templates"));
    assert_eq!(page.container_content("templates"), None);
    assert!(!page.render().contains("widget"));
  }
}
