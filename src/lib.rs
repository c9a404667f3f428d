//! # Version Store
//!
//! A content addressable object store with the on-disk layout of a
//! git repository: typed, zlib compressed objects keyed by the SHA-1
//! of their framed bytes, commit metadata in the key-value-list-with-message
//! format, and repository discovery by walking up from a directory.

/// A commit as a view over a [`kvlm::Kvlm`] document.
pub mod commit;
/// Reading and writing the repository `config` file.
pub mod config;
pub mod error;
/// Walking commit history into a graph.
pub mod history;
/// The key-value-list-with-message text format.
pub mod kvlm;
/// Typed objects and their framing.
pub mod object;
/// Hash-based binary object identifier.
pub mod object_id;
/// Content addressible store API using the [`object_id::ObjectId`].
pub mod object_store;
/// Locating, opening and bootstrapping repositories.
pub mod repository;

pub use error::{Error, Result};
