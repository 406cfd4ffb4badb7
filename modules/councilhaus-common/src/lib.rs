pub mod config;
pub mod entities;
pub mod error;
pub mod events;
pub mod ids;
pub mod roles;
pub mod types;

pub use config::Config;
pub use entities::*;
pub use error::IndexerError;
pub use events::{BudgetAllocation, CouncilEvent, LogEvent};
pub use ids::EntityKey;
pub use roles::{keccak256, GRANTEE_MANAGER_ROLE, MEMBER_MANAGER_ROLE};
pub use types::*;
