//! Recording document and gated fetch doubles shared by unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::document::{Document, DocumentError, Fetch, FetchError, NodeId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
  Script(String),
  Stylesheet(String),
  ContainerCreated(String),
  Removed(NodeId),
}

#[derive(Default)]
struct State {
  tags: Vec<BTreeMap<String, String>>,
  removed: Vec<NodeId>,
  events: Vec<Event>,
  containers: BTreeMap<String, String>,
}

#[derive(Default)]
pub struct RecordingDocument {
  state: Mutex<State>,
  failing_scripts: Vec<String>,
  refuse_removal: bool,
}

impl RecordingDocument {
  pub fn with_tag<'a>(self, attributes: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
    self.state.lock().unwrap().tags.push(
      attributes
        .into_iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect(),
    );
    self
  }

  pub fn failing_script(mut self, url: &str) -> Self {
    self.failing_scripts.push(url.to_string());
    self
  }

  pub fn refusing_removal(mut self) -> Self {
    self.refuse_removal = true;
    self
  }

  pub fn events(&self) -> Vec<Event> {
    self.state.lock().unwrap().events.clone()
  }

  pub fn container(&self, id: &str) -> Option<String> {
    self.state.lock().unwrap().containers.get(id).cloned()
  }

  pub fn injected_paths(&self) -> Vec<String> {
    self
      .events()
      .into_iter()
      .filter_map(|event| match event {
        Event::Script(path) | Event::Stylesheet(path) => Some(path),
        _ => None,
      })
      .collect()
  }
}

#[async_trait]
impl Document for RecordingDocument {
  fn last_script_tag(&self) -> Option<NodeId> {
    let state = self.state.lock().unwrap();
    (0..state.tags.len())
      .rev()
      .map(NodeId)
      .find(|node| !state.removed.contains(node))
  }

  fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
    let state = self.state.lock().unwrap();
    state.tags.get(node.0).and_then(|tag| tag.get(name).cloned())
  }

  async fn load_script(&self, url: &str) -> Result<(), DocumentError> {
    self
      .state
      .lock()
      .unwrap()
      .events
      .push(Event::Script(url.to_string()));
    if self.failing_scripts.iter().any(|failing| failing == url) {
      return Err(DocumentError::ScriptLoad {
        url: url.to_string(),
        reason: "404".into(),
      });
    }
    Ok(())
  }

  fn append_stylesheet(&self, url: &str) -> Result<(), DocumentError> {
    self
      .state
      .lock()
      .unwrap()
      .events
      .push(Event::Stylesheet(url.to_string()));
    Ok(())
  }

  fn has_container(&self, id: &str) -> bool {
    self.state.lock().unwrap().containers.contains_key(id)
  }

  fn create_hidden_container(&self, id: &str) -> Result<(), DocumentError> {
    let mut state = self.state.lock().unwrap();
    state.containers.insert(id.to_string(), String::new());
    state.events.push(Event::ContainerCreated(id.to_string()));
    Ok(())
  }

  fn container_content(&self, id: &str) -> Option<String> {
    self.container(id)
  }

  fn set_container_content(&self, id: &str, content: String) -> Result<(), DocumentError> {
    let mut state = self.state.lock().unwrap();
    match state.containers.get_mut(id) {
      Some(existing) => {
        *existing = content;
        Ok(())
      }
      None => Err(DocumentError::ContainerNotFound(id.to_string())),
    }
  }

  fn remove_node(&self, node: NodeId) -> Result<(), DocumentError> {
    if self.refuse_removal {
      return Err(DocumentError::NodeNotFound(node));
    }
    let mut state = self.state.lock().unwrap();
    state.removed.push(node);
    state.events.push(Event::Removed(node));
    Ok(())
  }
}

/// Fetch double whose responses are either ready up front or released through a gate.
#[derive(Default)]
pub struct GatedFetch {
  ready: HashMap<String, String>,
  gates: Mutex<HashMap<String, oneshot::Receiver<String>>>,
}

impl GatedFetch {
  pub fn ready<'a>(responses: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
    Self {
      ready: responses
        .into_iter()
        .map(|(url, text)| (url.to_string(), text.to_string()))
        .collect(),
      gates: Mutex::default(),
    }
  }

  pub fn gate(&self, url: &str) -> oneshot::Sender<String> {
    let (sender, receiver) = oneshot::channel();
    self.gates.lock().unwrap().insert(url.to_string(), receiver);
    sender
  }
}

#[async_trait]
impl Fetch for GatedFetch {
  async fn fetch(&self, url: &str) -> Result<String, FetchError> {
    if let Some(text) = self.ready.get(url) {
      return Ok(text.clone());
    }
    let gate = self.gates.lock().unwrap().remove(url);
    match gate {
      Some(receiver) => receiver.await.map_err(|err| FetchError::Transport {
        url: url.to_string(),
        reason: err.to_string(),
      }),
      None => Err(FetchError::Transport {
        url: url.to_string(),
        reason: "not found".into(),
      }),
    }
  }
}

/// Yield to spawned tasks until `condition` holds.
pub async fn wait_for(condition: impl Fn() -> bool) {
  for _ in 0..1_000 {
    if condition() {
      return;
    }
    tokio::task::yield_now().await;
  }
  panic!("condition not reached");
}
