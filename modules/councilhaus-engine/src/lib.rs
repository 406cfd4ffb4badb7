//! Council indexing engine.
//!
//! Maps each decoded contract log to deterministic entity identities and applies
//! create/update/delete operations to a derived entity store, one event at a
//! time in feed order. Malformed or inconsistent events are skipped whole,
//! never partially applied.
//!
//! Consumers plug in storage and chain access by implementing the traits in
//! [`traits`]; [`memory`] provides in-process versions of all of them.

pub mod feed;
pub mod handlers;
pub mod indexer;
pub mod memory;
pub mod outcome;
pub mod replay;
pub mod traits;

pub use indexer::{Indexer, IndexerDeps};
pub use memory::{MemoryCheckpoints, MemoryEntityStore, MemoryFeed, MemoryRegistry, StaticInstanceReader};
pub use outcome::{ApplyResult, IndexStats, SkipReason};
pub use replay::{replay_from, Follower};
pub use traits::{
    load_as, CheckpointStore, EntityStore, EventFeed, InstanceReader, InstanceState, SourceRegistry,
};
