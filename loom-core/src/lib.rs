//! Core, transport-agnostic pieces of the dev server: the specifier
//! classifier, path resolver, import graph, HMR propagator, rewrite engine
//! and its two-tier cache. `loom-server` wires these into axum; `loom`
//! wires the whole thing into a CLI with a filesystem watcher.

pub mod cache;
pub mod editor;
pub mod error;
pub mod graph;
pub mod hmr;
pub mod manifest;
pub mod resolver;
pub mod rewrite;
pub mod specifier;

pub use cache::{FileCache, ReadOutcome, RewriteCache};
pub use error::{CoreError, Result};
pub use graph::ImportGraph;
pub use hmr::{propagate, HmrMessage, HmrUpdate, UpdateKind};
pub use resolver::{Alias, ResolvedImport, Resolver};
pub use rewrite::{rewrite_module, RewriteResult, ENV_PUBLIC_PATH};
pub use specifier::{classify, clean_url, SpecifierKind};
