use thiserror::Error;

use crate::types::Address;

#[derive(Error, Debug)]
pub enum IndexerError {
    /// A freshly created instance could not be queried. There is no sensible
    /// partial Council to write, so the run halts here.
    #[error("Upstream inconsistency: instance {instance} could not be read at block {block_number}: {reason}")]
    UpstreamInconsistency {
        instance: Address,
        block_number: u64,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
