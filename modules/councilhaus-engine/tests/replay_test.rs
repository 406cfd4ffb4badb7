//! Checkpointed following and replay over an in-memory feed.

mod harness;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use councilhaus_common::{Address, CouncilEvent, CouncilMember, EntityKey, EntityKind, LogEvent, LogPosition};
use councilhaus_engine::{
    replay_from, CheckpointStore, Follower, MemoryCheckpoints, MemoryFeed,
};

use harness::*;

fn council_created(council: Address) -> CouncilEvent {
    CouncilEvent::CouncilCreated {
        council,
        metadata: Default::default(),
        pool: POOL,
    }
}

/// A council, a member, a grantee, and one allocation, one log per block.
fn scripted_logs() -> Vec<LogEvent> {
    vec![
        log_at(FACTORY, LogPosition::new(10, 0, 0), council_created(COUNCIL)),
        log_at(COUNCIL, LogPosition::new(11, 0, 3), member_added(MEMBER, 100)),
        log_at(
            COUNCIL,
            LogPosition::new(12, 1, 0),
            CouncilEvent::GranteeAdded {
                grantee: GRANTEE_1,
                metadata: Default::default(),
            },
        ),
        log_at(
            COUNCIL,
            LogPosition::new(13, 0, 7),
            budget_allocated(MEMBER, &[(GRANTEE_1, 50)]),
        ),
    ]
}

struct Setup {
    harness: Harness,
    feed: Arc<MemoryFeed>,
    checkpoints: Arc<MemoryCheckpoints>,
    follower: Follower,
}

fn setup(logs: Vec<LogEvent>, batch_size: usize) -> Setup {
    let harness = Harness::new();
    let feed = Arc::new(MemoryFeed::new(logs));
    let checkpoints = Arc::new(MemoryCheckpoints::new());
    let follower = Follower::new(
        harness.indexer.clone(),
        feed.clone(),
        checkpoints.clone(),
        "test-follower",
        0,
        batch_size,
    );
    Setup {
        harness,
        feed,
        checkpoints,
        follower,
    }
}

#[tokio::test]
async fn poll_applies_everything_and_checkpoints_the_last_position() {
    let s = setup(scripted_logs(), 3);

    let stats = s.follower.poll_once().await.unwrap();
    assert_eq!(stats.applied, 4);
    assert_eq!(stats.total(), 4);
    assert_eq!(stats.last_position, Some(LogPosition::new(13, 0, 7)));

    let checkpoint = s.checkpoints.load_checkpoint("test-follower").await.unwrap();
    assert_eq!(checkpoint, Some(LogPosition::new(13, 0, 7)));
    assert_eq!(s.harness.store.count(EntityKind::Allocation), 1);
}

#[tokio::test]
async fn poll_resumes_after_the_checkpoint() {
    let s = setup(scripted_logs(), 10);
    s.follower.poll_once().await.unwrap();

    // Nothing new: nothing applied.
    let idle = s.follower.poll_once().await.unwrap();
    assert_eq!(idle.total(), 0);

    s.feed.push(log_at(
        COUNCIL,
        LogPosition::new(14, 0, 0),
        CouncilEvent::CouncilMemberRemoved { member: MEMBER },
    ));
    let stats = s.follower.poll_once().await.unwrap();
    assert_eq!(stats.applied, 1);
    assert_eq!(stats.total(), 1);
    assert!(s
        .harness
        .store
        .get::<CouncilMember>(&EntityKey::council_member(&COUNCIL, &MEMBER))
        .is_none());
}

#[tokio::test]
async fn resume_position_starts_at_configured_block_without_checkpoint() {
    let harness = Harness::new();
    let follower = Follower::new(
        harness.indexer.clone(),
        Arc::new(MemoryFeed::default()),
        Arc::new(MemoryCheckpoints::new()),
        "fresh",
        42,
        5,
    );

    assert_eq!(
        follower.resume_position().await.unwrap(),
        LogPosition::start_of_block(42)
    );
}

#[tokio::test]
async fn replay_from_block_reproduces_the_same_store() {
    let s = setup(scripted_logs(), 2);
    s.follower.poll_once().await.unwrap();
    let before = s.harness.store.len();

    let stats = s.follower.replay_from_block(11).await.unwrap();
    assert_eq!(stats.total(), 3);
    assert_eq!(s.harness.store.len(), before);
    assert_eq!(s.harness.store.count(EntityKind::Allocation), 1);
    assert_eq!(s.harness.store.count(EntityKind::Vote), 1);
    assert_eq!(s.harness.store.count(EntityKind::CouncilMember), 1);
}

#[tokio::test]
async fn fatal_error_keeps_checkpoint_at_last_complete_batch() {
    let logs = vec![
        log_at(FACTORY, LogPosition::new(1, 0, 0), council_created(COUNCIL)),
        log_at(COUNCIL, LogPosition::new(2, 0, 0), member_added(MEMBER, 1)),
        log_at(FACTORY, LogPosition::new(3, 0, 0), council_created(BROKEN_COUNCIL)),
        log_at(COUNCIL, LogPosition::new(4, 0, 0), member_added(GRANTEE_1, 1)),
    ];
    let s = setup(logs, 2);

    assert!(s.follower.poll_once().await.is_err());

    let checkpoint = s.checkpoints.load_checkpoint("test-follower").await.unwrap();
    assert_eq!(checkpoint, Some(LogPosition::new(2, 0, 0)));
    assert_eq!(s.harness.store.count(EntityKind::CouncilMember), 1);

    // The next attempt starts at the failing event again.
    assert_eq!(
        s.follower.resume_position().await.unwrap(),
        LogPosition::new(2, 0, 1)
    );
    assert!(s.follower.poll_once().await.is_err());
}

#[tokio::test]
async fn shutdown_ends_the_run_at_a_batch_boundary() {
    let s = setup(scripted_logs(), 2);
    let shutdown = Arc::new(AtomicBool::new(true));
    let follower = s.follower.with_shutdown(shutdown.clone());
    assert!(follower.shutdown_requested());

    // The batch in flight completes and is checkpointed; the next is not read.
    let stats = follower.poll_once().await.unwrap();
    assert_eq!(stats.applied, 2);
    assert_eq!(
        s.checkpoints.load_checkpoint("test-follower").await.unwrap(),
        Some(LogPosition::new(11, 0, 3))
    );
    assert_eq!(s.harness.store.count(EntityKind::Grantee), 0);

    // Clearing the flag resumes exactly where the run stopped.
    shutdown.store(false, Ordering::SeqCst);
    let rest = follower.poll_once().await.unwrap();
    assert_eq!(rest.applied, 2);
    assert_eq!(s.harness.store.count(EntityKind::Allocation), 1);
}

#[tokio::test]
async fn zero_batch_size_is_rejected() {
    let h = Harness::new();
    let feed = MemoryFeed::new(scripted_logs());

    let err = replay_from(&h.indexer, &feed, LogPosition::default(), 0)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("batch size"));
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn replay_from_skips_earlier_positions() {
    let h = Harness::new();
    h.create_council(COUNCIL).await;
    let feed = MemoryFeed::new(scripted_logs());

    // Starting past the member log: the allocation's member is unknown.
    let stats = replay_from(&h.indexer, &feed, LogPosition::new(12, 0, 0), 10)
        .await
        .unwrap();
    assert_eq!(stats.applied, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(h.store.count(EntityKind::Allocation), 0);
}
