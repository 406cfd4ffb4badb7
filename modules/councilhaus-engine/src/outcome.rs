//! What happened to each event.

use std::fmt;

use councilhaus_common::{EntityKey, EntityKind, LogPosition};

/// Result of applying a single event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyResult {
    /// The event produced a store mutation.
    Applied,
    /// Nothing to do: unrouted source, or a delete of an absent record.
    NoOp,
    /// The event was dropped without writing anything.
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A record the event depends on does not exist.
    MissingParentReference { kind: EntityKind, key: EntityKey },
    /// At least one grantee in a budget allocation is unknown.
    PartialAllocation {
        member: EntityKey,
        missing: Vec<EntityKey>,
    },
    /// The allocation's parallel arrays have different lengths.
    MalformedAllocation { accounts: usize, amounts: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingParentReference { kind, key } => {
                write!(f, "missing {kind} {key}")
            }
            SkipReason::PartialAllocation { member, missing } => {
                write!(f, "allocation by {member} references {} unknown grantee(s)", missing.len())
            }
            SkipReason::MalformedAllocation { accounts, amounts } => {
                write!(f, "allocation has {accounts} accounts but {amounts} amounts")
            }
        }
    }
}

/// Counters over a run of events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub applied: u64,
    pub noop: u64,
    pub skipped: u64,
    pub last_position: Option<LogPosition>,
}

impl IndexStats {
    pub fn record(&mut self, result: &ApplyResult, position: LogPosition) {
        match result {
            ApplyResult::Applied => self.applied += 1,
            ApplyResult::NoOp => self.noop += 1,
            ApplyResult::Skipped(_) => self.skipped += 1,
        }
        self.last_position = Some(position);
    }

    pub fn merge(&mut self, other: IndexStats) {
        self.applied += other.applied;
        self.noop += other.noop;
        self.skipped += other.skipped;
        if other.last_position.is_some() {
            self.last_position = other.last_position;
        }
    }

    pub fn total(&self) -> u64 {
        self.applied + self.noop + self.skipped
    }
}
