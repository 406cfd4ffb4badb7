//! Ordered, append-only store of decoded contract logs.
//!
//! The crawler appends decoded logs; the indexer reads them back in the chain's
//! total order (block, transaction, log) and projects them into entities.

pub mod store;
pub mod types;

pub use store::LogStore;
pub use types::{position_columns, StoredLog};
