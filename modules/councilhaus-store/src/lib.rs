//! Postgres implementations of the engine's storage seams.
//!
//! Entities are stored as JSONB documents keyed by `(kind, id)`. The schema
//! lives in the workspace `migrations/` directory and is applied by [`migrate`].

pub mod checkpoints;
pub mod entities;
pub mod migrate;
pub mod registry;

pub use checkpoints::PgCheckpoints;
pub use entities::PgEntityStore;
pub use migrate::migrate;
pub use registry::PgSourceRegistry;
