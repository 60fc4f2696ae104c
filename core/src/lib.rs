//! Near-real-time searcher management for Lucene.
//!
//! A [search::ReferenceManager] shares a periodically refreshed, reference counted resource (usually an
//! [search::IndexSearcher]) across threads. [index::TrackingIndexWriter] stamps every index change with a
//! generation, and [search::ControlledRealTimeReopenThread] reopens in the background so callers can wait
//! until their own change is searchable. [search::SearcherLifetimeManager] keeps older searchers alive for
//! follow-on requests such as paging.

#![warn(clippy::all)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
#![warn(missing_docs)]

mod error;
mod id;

/// Documents and fields.
pub mod document;

/// Lucene index (database) types.
pub mod index;

/// Lucene search types.
pub mod search;

/// Utility types.
pub mod util;

pub use {error::*, id::*};
