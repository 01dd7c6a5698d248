//! Static HTML page backend.
//!
//! The page is scanned once for `<script>` elements and the closing `head`/`body` tags,
//! ignoring anything inside `<!-- ... -->` comments. The invoking tag is the last script
//! whose `src` contains the loader marker, or the last script when none does.
//! Injections are recorded and spliced into the original markup by [`HtmlPage::render`]:
//! scripts land directly after the invoking tag, stylesheet links before `</head>`, and
//! template text into the container element (an existing one is reused, a new one is
//! placed before `</body>`).

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::ops::Range;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;

use super::{Document, DocumentError, NodeId};

// Attribute span that skips `>` inside quoted values.
const ATTRIBUTES: &str = r#"((?:[^>"']|"[^"]*"|'[^']*')*)"#;

fn comment_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| Regex::new(r"(?s)<!--.*?-->").expect("invalid comment regex"))
}

fn script_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(&format!(r"(?is)<script\b{ATTRIBUTES}>.*?</script\s*>"))
      .expect("invalid script regex")
  })
}

fn open_tag_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(&format!(r"(?s)<([A-Za-z][A-Za-z0-9-]*)\b{ATTRIBUTES}>"))
      .expect("invalid open tag regex")
  })
}

fn attribute_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r#"([^\s"'=<>/]+)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
      .expect("invalid attribute regex")
  })
}

fn head_close_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| Regex::new(r"(?i)</head\s*>").expect("invalid head regex"))
}

fn body_close_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| Regex::new(r"(?i)</body\s*>").expect("invalid body regex"))
}

#[derive(Debug)]
struct ScriptTag {
  span: Range<usize>,
  attributes: BTreeMap<String, String>,
}

#[derive(Debug)]
struct Container {
  id: String,
  content: String,
  // Inner HTML range of an element already present in the markup.
  inner: Option<Range<usize>>,
}

#[derive(Debug)]
struct PageState {
  source: String,
  // `source` with comment bytes blanked out; offsets match `source`.
  scan: String,
  scripts: Vec<ScriptTag>,
  invoking: Option<usize>,
  head_close: Option<usize>,
  body_close: Option<usize>,
  emitted_scripts: Vec<String>,
  stylesheets: Vec<String>,
  containers: Vec<Container>,
  removed: BTreeSet<usize>,
}

impl PageState {
  fn invocation_point(&self) -> usize {
    self
      .invoking
      .and_then(|index| self.scripts.get(index))
      .map(|tag| tag.span.end)
      .or(self.body_close)
      .unwrap_or(self.source.len())
  }

  fn container_mut(&mut self, id: &str) -> Option<&mut Container> {
    if !self.containers.iter().any(|container| container.id == id) {
      let inner = find_element_inner(&self.scan, id)?;
      let content = self.source[inner.clone()].to_string();
      self.containers.push(Container {
        id: id.to_string(),
        content,
        inner: Some(inner),
      });
    }
    self
      .containers
      .iter_mut()
      .find(|container| container.id == id)
  }
}

/// HTML page held in memory, mutated through the [`Document`] interface.
#[derive(Debug)]
pub struct HtmlPage {
  state: Mutex<PageState>,
}

impl HtmlPage {
  /// Parse `source`, treating the last script tag as the invoking tag.
  pub fn parse(source: impl Into<String>) -> Self {
    Self::build(source.into(), None)
  }

  /// Parse `source`, treating the last script whose `src` contains `marker` as the
  /// invoking tag.
  pub fn parse_with_marker(source: impl Into<String>, marker: &str) -> Self {
    Self::build(source.into(), Some(marker))
  }

  /// Read and parse the page stored at `path`, locating the invoking tag by `marker`.
  pub fn read(path: &Path, marker: &str) -> Result<Self> {
    let source = fs::read_to_string(path)
      .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(Self::parse_with_marker(source, marker))
  }

  fn build(source: String, marker: Option<&str>) -> Self {
    let scan = mask_comments(&source);
    let scripts: Vec<ScriptTag> = script_pattern()
      .captures_iter(&scan)
      .filter_map(|caps| {
        let whole = caps.get(0)?;
        let attributes = caps
          .get(1)
          .map(|attrs| parse_attributes(attrs.as_str()))
          .unwrap_or_default();
        Some(ScriptTag {
          span: whole.range(),
          attributes,
        })
      })
      .collect();

    let invoking = marker
      .filter(|marker| !marker.is_empty())
      .and_then(|marker| {
        scripts.iter().rposition(|tag| {
          tag
            .attributes
            .get("src")
            .is_some_and(|src| src.contains(marker))
        })
      })
      .or_else(|| scripts.len().checked_sub(1));

    let head_close = head_close_pattern().find(&scan).map(|m| m.start());
    let body_close = body_close_pattern()
      .find_iter(&scan)
      .last()
      .map(|m| m.start());

    Self {
      state: Mutex::new(PageState {
        source,
        scan,
        scripts,
        invoking,
        head_close,
        body_close,
        emitted_scripts: Vec::new(),
        stylesheets: Vec::new(),
        containers: Vec::new(),
        removed: BTreeSet::new(),
      }),
    }
  }

  /// Script URLs emitted so far, in emission order.
  pub fn emitted_scripts(&self) -> Vec<String> {
    self.state().emitted_scripts.clone()
  }

  /// Stylesheet URLs linked so far, in insertion order.
  pub fn stylesheets(&self) -> Vec<String> {
    self.state().stylesheets.clone()
  }

  /// Serialise the page with every recorded injection applied.
  pub fn render(&self) -> String {
    let state = self.state();
    let mut edits: Vec<(usize, usize, String)> = Vec::new();

    for index in &state.removed {
      if let Some(tag) = state.scripts.get(*index) {
        edits.push((tag.span.start, tag.span.end, String::new()));
      }
    }

    if !state.emitted_scripts.is_empty() {
      let tags: Vec<String> = state
        .emitted_scripts
        .iter()
        .map(|url| format!("<script src=\"{}\"></script>", escape_attribute(url)))
        .collect();
      let point = state.invocation_point();
      edits.push((point, point, tags.join("\n")));
    }

    if let Some(head_close) = state.head_close
      && !state.stylesheets.is_empty()
    {
      let links: String = state
        .stylesheets
        .iter()
        .map(|url| {
          format!(
            "<link rel=\"stylesheet\" type=\"text/css\" href=\"{}\">\n",
            escape_attribute(url)
          )
        })
        .collect();
      edits.push((head_close, head_close, links));
    }

    let mut created = String::new();
    for container in &state.containers {
      match &container.inner {
        Some(inner) => edits.push((inner.start, inner.end, container.content.clone())),
        None => created.push_str(&format!(
          "<div id=\"{}\" style=\"display: none;\">{}</div>\n",
          escape_attribute(&container.id),
          container.content
        )),
      }
    }
    if let Some(body_close) = state.body_close
      && !created.is_empty()
    {
      edits.push((body_close, body_close, created));
    }

    edits.sort_by_key(|(start, end, _)| (*start, *end));

    let mut output = String::with_capacity(state.source.len());
    let mut cursor = 0;
    for (start, end, replacement) in edits {
      if start < cursor {
        continue;
      }
      output.push_str(&state.source[cursor..start]);
      output.push_str(&replacement);
      cursor = end;
    }
    output.push_str(&state.source[cursor..]);
    output
  }

  fn state(&self) -> MutexGuard<'_, PageState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

#[async_trait]
impl Document for HtmlPage {
  fn last_script_tag(&self) -> Option<NodeId> {
    let state = self.state();
    if let Some(invoking) = state.invoking
      && !state.removed.contains(&invoking)
    {
      return Some(NodeId(invoking));
    }
    (0..state.scripts.len())
      .rev()
      .find(|index| !state.removed.contains(index))
      .map(NodeId)
  }

  fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
    let state = self.state();
    if state.removed.contains(&node.0) {
      return None;
    }
    state
      .scripts
      .get(node.0)
      .and_then(|tag| tag.attributes.get(&name.to_ascii_lowercase()).cloned())
  }

  async fn load_script(&self, url: &str) -> Result<(), DocumentError> {
    self.state().emitted_scripts.push(url.to_string());
    Ok(())
  }

  fn append_stylesheet(&self, url: &str) -> Result<(), DocumentError> {
    let mut state = self.state();
    if state.head_close.is_none() {
      return Err(DocumentError::MissingElement("head"));
    }
    state.stylesheets.push(url.to_string());
    Ok(())
  }

  fn has_container(&self, id: &str) -> bool {
    self.state().container_mut(id).is_some()
  }

  fn create_hidden_container(&self, id: &str) -> Result<(), DocumentError> {
    let mut state = self.state();
    if state.container_mut(id).is_some() {
      return Ok(());
    }
    if state.body_close.is_none() {
      return Err(DocumentError::MissingElement("body"));
    }
    state.containers.push(Container {
      id: id.to_string(),
      content: String::new(),
      inner: None,
    });
    Ok(())
  }

  fn container_content(&self, id: &str) -> Option<String> {
    self
      .state()
      .container_mut(id)
      .map(|container| container.content.clone())
  }

  fn set_container_content(&self, id: &str, content: String) -> Result<(), DocumentError> {
    let mut state = self.state();
    let container = state
      .container_mut(id)
      .ok_or_else(|| DocumentError::ContainerNotFound(id.to_string()))?;
    container.content = content;
    Ok(())
  }

  fn remove_node(&self, node: NodeId) -> Result<(), DocumentError> {
    let mut state = self.state();
    if node.0 >= state.scripts.len() || !state.removed.insert(node.0) {
      return Err(DocumentError::NodeNotFound(node));
    }
    Ok(())
  }
}

/// Replace every character inside HTML comments with spaces of the same byte length.
fn mask_comments(source: &str) -> String {
  let mut masked = String::with_capacity(source.len());
  let mut cursor = 0;
  for comment in comment_pattern().find_iter(source) {
    masked.push_str(&source[cursor..comment.start()]);
    masked.extend(std::iter::repeat_n(' ', comment.len()));
    cursor = comment.end();
  }
  masked.push_str(&source[cursor..]);
  masked
}

/// Inner HTML range of the first element whose `id` attribute equals `id`.
fn find_element_inner(scan: &str, id: &str) -> Option<Range<usize>> {
  let caps = open_tag_pattern().captures_iter(scan).find(|caps| {
    caps
      .get(2)
      .map(|attrs| parse_attributes(attrs.as_str()))
      .and_then(|attributes| attributes.get("id").cloned())
      .is_some_and(|value| value == id)
  })?;
  let open = caps.get(0)?;
  if open.as_str().ends_with("/>") {
    return Some(open.end()..open.end());
  }

  let name = regex::escape(caps.get(1)?.as_str());
  let nested = Regex::new(&format!(r"(?i)<(/)?{name}\b{ATTRIBUTES}>")).ok()?;
  let mut depth = 1usize;
  for tag in nested.captures_iter(&scan[open.end()..]) {
    let whole = tag.get(0)?;
    if tag.get(1).is_some() {
      depth -= 1;
      if depth == 0 {
        let close = open.end() + whole.start();
        return Some(open.end()..close);
      }
    } else if !whole.as_str().ends_with("/>") {
      depth += 1;
    }
  }
  Some(open.end()..open.end())
}

fn parse_attributes(raw: &str) -> BTreeMap<String, String> {
  attribute_pattern()
    .captures_iter(raw)
    .filter_map(|caps| {
      let name = caps.get(1)?.as_str().to_ascii_lowercase();
      let value = caps
        .get(2)
        .or_else(|| caps.get(3))
        .or_else(|| caps.get(4))
        .map(|m| unescape_attribute(m.as_str()))
        .unwrap_or_default();
      Some((name, value))
    })
    .collect()
}

fn escape_attribute(value: &str) -> String {
  value
    .replace('&', "&amp;")
    .replace('"', "&quot;")
    .replace('<', "&lt;")
    .replace('>', "&gt;")
}

fn unescape_attribute(value: &str) -> String {
  value
    .replace("&quot;", "\"")
    .replace("&#39;", "'")
    .replace("&lt;", "<")
    .replace("&gt;", ">")
    .replace("&amp;", "&")
}
