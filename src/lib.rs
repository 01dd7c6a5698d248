#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod bootstrap;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod document;
pub mod injector;
pub mod resolver;

#[cfg(test)]
mod testing;

pub use bootstrap::{Bootstrap, LoadReport};
pub use catalog::BundleCatalog;
pub use classify::{ResourceKind, classify};
pub use config::LoaderConfig;
pub use document::{Document, DocumentError, Fetch, FetchError, NodeId};
pub use injector::{Injector, LoaderError, PendingTemplates};
pub use resolver::{ManifestEntry, ResolvedManifest, Resolver};
