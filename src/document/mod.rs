//! Interfaces to the host document and the transport used for template fragments.
//!
//! The loader never touches a concrete DOM. Backends implement [`Document`] for the page
//! they drive and [`Fetch`] for whatever transport can retrieve fragment text. Two backends
//! ship with the crate: [`page::HtmlPage`], which applies injections to a static HTML file,
//! and [`fs_fetch::FsFetch`], which reads fragments from a directory.

pub mod fs_fetch;
pub mod page;

use std::path::PathBuf;

use async_trait::async_trait;

/// Opaque handle to an element owned by a [`Document`] backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Live document the loader injects resources into.
///
/// Implementations use interior mutability; every method takes `&self` so a document can be
/// shared with template completion tasks.
#[async_trait]
pub trait Document: Send + Sync {
  /// Last script element present in the document at the time of the call.
  fn last_script_tag(&self) -> Option<NodeId>;

  /// Value of attribute `name` on `node`, if the node exists and carries it.
  fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

  /// Emit a script directive for `url` and resolve once the script is ready.
  ///
  /// Scripts are emitted at the point of invocation, in call order.
  async fn load_script(&self, url: &str) -> Result<(), DocumentError>;

  /// Append a stylesheet link for `url` to the document head.
  fn append_stylesheet(&self, url: &str) -> Result<(), DocumentError>;

  /// Returns `true` when an element with identifier `id` exists.
  fn has_container(&self, id: &str) -> bool;

  /// Create a hidden element with identifier `id` at the end of the body.
  fn create_hidden_container(&self, id: &str) -> Result<(), DocumentError>;

  /// Current inner content of the container `id`.
  fn container_content(&self, id: &str) -> Option<String>;

  /// Replace the inner content of the container `id`.
  fn set_container_content(&self, id: &str, content: String) -> Result<(), DocumentError>;

  /// Detach `node` from the document.
  fn remove_node(&self, node: NodeId) -> Result<(), DocumentError>;
}

/// Transport capable of retrieving the text of a template fragment.
#[async_trait]
pub trait Fetch: Send + Sync {
  /// Fetch `url` and return its body as text.
  async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Failures reported by [`Document`] backends.
#[derive(Debug)]
pub enum DocumentError {
  /// A structural element (`head`, `body`) is missing.
  MissingElement(&'static str),
  /// The node handle does not refer to an element in the document.
  NodeNotFound(NodeId),
  /// No container with the given identifier exists.
  ContainerNotFound(String),
  /// The script could not be loaded.
  ScriptLoad {
    /// Script URL.
    url: String,
    /// Backend supplied reason.
    reason: String,
  },
}

impl std::fmt::Display for DocumentError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::MissingElement(element) => write!(f, "document has no <{element}> element"),
      Self::NodeNotFound(node) => write!(f, "node {} is not part of the document", node.0),
      Self::ContainerNotFound(id) => write!(f, "no element with id `{id}`"),
      Self::ScriptLoad { url, reason } => write!(f, "failed to load script {url}: {reason}"),
    }
  }
}

impl std::error::Error for DocumentError {}

/// Failures reported by [`Fetch`] implementations.
#[derive(Debug)]
pub enum FetchError {
  /// The transport does not handle this kind of URL.
  Unsupported {
    /// Requested URL.
    url: String,
  },
  /// Reading the resource failed.
  Io {
    /// Location that was read.
    path: PathBuf,
    /// Source I/O error.
    source: std::io::Error,
  },
  /// Transport specific failure.
  Transport {
    /// Requested URL.
    url: String,
    /// Backend supplied reason.
    reason: String,
  },
}

impl std::fmt::Display for FetchError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Unsupported { url } => write!(f, "cannot fetch {url} with this transport"),
      Self::Io { path, source } => write!(f, "failed to read {}: {}", path.display(), source),
      Self::Transport { url, reason } => write!(f, "failed to fetch {url}: {reason}"),
    }
  }
}

impl std::error::Error for FetchError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      Self::Io { source, .. } => Some(source),
      _ => None,
    }
  }
}
