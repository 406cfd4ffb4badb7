//! Shared fixtures for engine tests: fixed addresses, an in-memory indexer,
//! and a log builder that hands out increasing chain positions.

#![allow(dead_code)]

use std::cell::Cell;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use councilhaus_common::{
    keccak256, Address, Amount, BudgetAllocation, Bytes, CouncilEvent, EventMeta, LogEvent,
    LogPosition,
};
use councilhaus_engine::{
    Indexer, IndexerDeps, InstanceState, MemoryEntityStore, MemoryRegistry, StaticInstanceReader,
};

pub const FACTORY: Address = Address::repeat_byte(0xfa);
pub const COUNCIL: Address = Address::repeat_byte(0xc1);
pub const OTHER_COUNCIL: Address = Address::repeat_byte(0xc2);
/// Deployed per the factory but not readable from the chain.
pub const BROKEN_COUNCIL: Address = Address::repeat_byte(0xcf);
pub const POOL: Address = Address::repeat_byte(0x9a);
pub const TOKEN: Address = Address::repeat_byte(0x70);

pub const MEMBER: Address = Address::repeat_byte(0x01);
pub const GRANTEE_1: Address = Address::repeat_byte(0x11);
pub const GRANTEE_2: Address = Address::repeat_byte(0x12);
pub const GRANTEE_3: Address = Address::repeat_byte(0x13);

pub const GENESIS_TS: i64 = 1_700_000_000;

pub fn instance_state(max: u64) -> InstanceState {
    InstanceState {
        distribution_token: TOKEN,
        max_allocations_per_member: Amount::from(max),
    }
}

pub fn block_time(block: u64) -> DateTime<Utc> {
    let offset = i64::try_from(block).unwrap() * 12;
    Utc.timestamp_opt(GENESIS_TS + offset, 0).unwrap()
}

/// Build a log at an explicit position. Logs in the same transaction share a hash.
pub fn log_at(source: Address, position: LogPosition, event: CouncilEvent) -> LogEvent {
    LogEvent::new(
        EventMeta {
            source,
            position,
            block_timestamp: block_time(position.block_number),
            transaction_hash: keccak256(format!(
                "{}:{}",
                position.block_number, position.transaction_index
            )),
        },
        event,
    )
}

pub struct Harness {
    pub store: Arc<MemoryEntityStore>,
    pub registry: Arc<MemoryRegistry>,
    pub indexer: Indexer,
    next_block: Cell<u64>,
}

impl Harness {
    pub fn new() -> Self {
        let reader = StaticInstanceReader::new()
            .with_instance(COUNCIL, instance_state(3))
            .with_instance(OTHER_COUNCIL, instance_state(5));
        Self::with_reader(reader)
    }

    pub fn with_reader(reader: StaticInstanceReader) -> Self {
        let store = Arc::new(MemoryEntityStore::new());
        let registry = Arc::new(MemoryRegistry::new());
        let indexer = Indexer::new(
            IndexerDeps::builder()
                .store(store.clone())
                .registry(registry.clone())
                .reader(Arc::new(reader))
                .factories(vec![FACTORY])
                .build(),
        );
        Self {
            store,
            registry,
            indexer,
            next_block: Cell::new(1),
        }
    }

    /// A log one block after the previous one.
    pub fn log(&self, source: Address, event: CouncilEvent) -> LogEvent {
        let block = self.next_block.get();
        self.next_block.set(block + 1);
        log_at(source, LogPosition::start_of_block(block), event)
    }

    /// Apply `CouncilCreated` for `council` from the trusted factory.
    pub async fn create_council(&self, council: Address) {
        let log = self.log(
            FACTORY,
            CouncilEvent::CouncilCreated {
                council,
                metadata: Bytes::from(b"ipfs://council".to_vec()),
                pool: POOL,
            },
        );
        self.indexer.apply(&log).await.unwrap();
    }

    pub async fn add_member(&self, council: Address, member: Address, power: u64) {
        let log = self.log(council, member_added(member, power));
        self.indexer.apply(&log).await.unwrap();
    }

    pub async fn add_grantee(&self, council: Address, grantee: Address) {
        let log = self.log(
            council,
            CouncilEvent::GranteeAdded {
                grantee,
                metadata: Bytes::from(b"grantee".to_vec()),
            },
        );
        self.indexer.apply(&log).await.unwrap();
    }
}

pub fn member_added(member: Address, power: u64) -> CouncilEvent {
    CouncilEvent::CouncilMemberAdded {
        member,
        voting_power: Amount::from(power),
    }
}

pub fn budget_allocated(member: Address, split: &[(Address, u64)]) -> CouncilEvent {
    CouncilEvent::BudgetAllocated {
        member,
        allocation: BudgetAllocation {
            accounts: split.iter().map(|(a, _)| *a).collect(),
            amounts: split.iter().map(|(_, n)| Amount::from(*n)).collect(),
        },
    }
}
