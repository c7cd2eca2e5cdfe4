//! Integration tests for the lock manager.
//!
//! Timing scenarios run on Tokio's paused test clock: virtual time only
//! advances while every task is idle, so maintenance passes happen at
//! deterministic instants. Deadlines land on whole time units; sleeps
//! leave half a unit of slack for deadlines that coincide with a
//! maintenance tick.

use std::time::Duration;

use lockerd_core::{LockError, LockManager, ManagerConfig};

/// One time unit; maintenance runs at this interval.
const T: Duration = Duration::from_millis(100);

fn started_manager() -> LockManager {
    let manager = LockManager::new(ManagerConfig {
        maintenance_interval: T,
    });
    manager.start();
    manager
}

/// Sleeps `units` time units plus half a unit of slack.
async fn settle(units: u32) {
    tokio::time::sleep(T * units + T / 2).await;
}

fn assert_locked_by(manager: &LockManager, path: &str, expected: u64) {
    let locker = manager.is_locked(path).unwrap();
    assert_eq!(
        locker, expected,
        "expected {path:?} to be locked by {expected}, but it is locked by {locker}",
    );
}

#[tokio::test(start_paused = true)]
async fn acquire_invalid_path() {
    let manager = started_manager();

    let result = manager.acquire("/", T * 10, T * 10);
    assert_eq!(result.err(), Some(LockError::InvalidPath("/".to_string())));

    manager.stop();
}

#[tokio::test(start_paused = true)]
async fn acquire_expires() {
    let manager = started_manager();

    let mut ticket = manager.acquire("a", T * 10, T * 10).unwrap();

    // The lock is acquired immediately.
    assert_eq!(ticket.try_acquired(), Some(true));
    assert_locked_by(&manager, "a", ticket.id());

    // Wait for the lease to run out.
    settle(11).await;
    assert_locked_by(&manager, "a", 0);

    manager.stop();
}

#[tokio::test(start_paused = true)]
async fn second_times_out_while_acquiring() {
    let manager = started_manager();

    let mut ticket_a = manager.acquire("a", T * 10, T * 20).unwrap();
    assert_eq!(ticket_a.try_acquired(), Some(true));

    // Attempt to acquire while the first caller is holding the lock.
    let mut ticket_b = manager.acquire("a", T * 10, T * 20).unwrap();
    assert_eq!(ticket_b.try_acquired(), None);
    assert_locked_by(&manager, "a", ticket_a.id());

    // The waiter gives up before the holder's lease runs out.
    settle(11).await;
    assert_eq!(ticket_b.try_acquired(), Some(false));
    assert_locked_by(&manager, "a", ticket_a.id());

    // And eventually the holder expires too.
    settle(11).await;
    assert_locked_by(&manager, "a", 0);

    manager.stop();
}

#[tokio::test(start_paused = true)]
async fn second_acquires_after_first_expires() {
    let manager = started_manager();

    let mut ticket_a = manager.acquire("a", T * 10, T * 10).unwrap();
    assert_eq!(ticket_a.try_acquired(), Some(true));

    let mut ticket_b = manager.acquire("a", T * 20, T * 10).unwrap();
    assert_eq!(ticket_b.try_acquired(), None);
    assert_locked_by(&manager, "a", ticket_a.id());

    // Half way through the first lease nothing has changed.
    tokio::time::sleep(T * 5).await;
    assert_eq!(ticket_b.try_acquired(), None);
    assert_locked_by(&manager, "a", ticket_a.id());

    // The first lease runs out and the waiter is promoted.
    settle(6).await;
    assert_eq!(ticket_b.try_acquired(), Some(true));
    assert_locked_by(&manager, "a", ticket_b.id());

    // The promoted holder expires in turn.
    settle(11).await;
    assert_locked_by(&manager, "a", 0);

    manager.stop();
}

#[tokio::test(start_paused = true)]
async fn staggered_chain_of_acquirers() {
    let manager = started_manager();

    let ticket_a = manager.acquire("a", T * 40, T * 10).unwrap();
    let ticket_b = manager.acquire("a", T * 40, T * 10).unwrap();
    let ticket_c = manager.acquire("a", T * 40, T * 10).unwrap();
    let ticket_d = manager.acquire("a", T * 40, T * 10).unwrap();

    assert_locked_by(&manager, "a", ticket_a.id());

    settle(11).await;
    assert_locked_by(&manager, "a", ticket_b.id());

    settle(11).await;
    assert_locked_by(&manager, "a", ticket_c.id());

    settle(11).await;
    assert_locked_by(&manager, "a", ticket_d.id());

    settle(11).await;
    assert_locked_by(&manager, "a", 0);

    manager.stop();
}

#[tokio::test(start_paused = true)]
async fn releasing_a_waiter_cancels_its_acquisition() {
    let manager = started_manager();

    let mut ticket_a = manager.acquire("a", T * 10, T * 20).unwrap();
    assert_eq!(ticket_a.try_acquired(), Some(true));

    let mut ticket_b = manager.acquire("a", T * 50, T * 20).unwrap();
    assert_eq!(ticket_b.try_acquired(), None);
    assert_locked_by(&manager, "a", ticket_a.id());

    // Nothing changes while both deadlines are in the future.
    settle(11).await;
    assert_eq!(ticket_b.try_acquired(), None);

    // Withdraw the waiting acquisition.
    assert!(manager.release("a", ticket_b.id()).unwrap());
    assert_eq!(ticket_b.try_acquired(), Some(false));
    assert_locked_by(&manager, "a", ticket_a.id());

    // Releasing it a second time finds nothing.
    assert!(!manager.release("a", ticket_b.id()).unwrap());

    // The holder expires on its own schedule.
    settle(11).await;
    assert_locked_by(&manager, "a", 0);

    manager.stop();
}

#[tokio::test(start_paused = true)]
async fn released_lock_can_be_reacquired_immediately() {
    let manager = started_manager();

    let mut ticket_a = manager.acquire("a", T * 10, T * 20).unwrap();
    assert_eq!(ticket_a.try_acquired(), Some(true));
    assert_locked_by(&manager, "a", ticket_a.id());

    // Release and observe the unlocked state before any maintenance tick.
    assert!(manager.release("a", ticket_a.id()).unwrap());
    assert_locked_by(&manager, "a", 0);

    let mut ticket_b = manager.acquire("a", T * 10, T * 20).unwrap();
    assert_eq!(ticket_b.try_acquired(), Some(true));
    assert_locked_by(&manager, "a", ticket_b.id());

    manager.stop();
}

#[tokio::test(start_paused = true)]
async fn releasing_the_holder_promotes_the_next_waiter() {
    let manager = started_manager();

    let ticket_a = manager.acquire("a", T * 10, T * 20).unwrap();
    let mut ticket_b = manager.acquire("a", T * 20, T * 10).unwrap();
    assert_eq!(ticket_b.try_acquired(), None);

    assert!(manager.release("a", ticket_a.id()).unwrap());

    // Promotion happens in-line with the release.
    assert_eq!(ticket_b.try_acquired(), Some(true));
    assert_locked_by(&manager, "a", ticket_b.id());

    manager.stop();
}

#[tokio::test(start_paused = true)]
async fn releasing_a_waiter_leaves_the_queue_order_intact() {
    let manager = started_manager();

    let ticket_a = manager.acquire("a", T * 10, T * 20).unwrap();
    let mut ticket_b = manager.acquire("a", T * 20, T * 20).unwrap();
    let ticket_c = manager.acquire("a", T * 20, T * 20).unwrap();

    assert!(manager.release("a", ticket_b.id()).unwrap());
    assert_eq!(ticket_b.try_acquired(), Some(false));

    let state = manager.inspect("a").unwrap();
    assert_eq!(state.locking_id, ticket_a.id());
    let waiting: Vec<u64> = state.acquirers.iter().map(|a| a.id).collect();
    assert_eq!(waiting, vec![ticket_c.id()]);

    manager.stop();
}

#[tokio::test(start_paused = true)]
async fn extending_outlives_the_original_lease() {
    let manager = started_manager();

    let mut ticket_a = manager.acquire("a", T * 10, T * 10).unwrap();
    assert_eq!(ticket_a.try_acquired(), Some(true));

    let mut ticket_b = manager.acquire("a", T * 40, T * 10).unwrap();
    assert_eq!(ticket_b.try_acquired(), None);

    // Extend the lease half way through; only the holder may extend.
    tokio::time::sleep(T * 5).await;
    assert!(manager.extend("a", ticket_a.id(), T * 20).unwrap());
    assert!(!manager.extend("a", ticket_b.id(), T * 20).unwrap());

    // Well past the original lease the stale expiry timer has fired and
    // done nothing.
    settle(11).await;
    assert_locked_by(&manager, "a", ticket_a.id());
    assert_eq!(ticket_b.try_acquired(), None);

    // The extended lease runs out and the waiter takes over.
    settle(11).await;
    assert_eq!(ticket_b.try_acquired(), Some(true));
    assert_locked_by(&manager, "a", ticket_b.id());

    // And the promoted holder expires in turn.
    settle(11).await;
    assert_locked_by(&manager, "a", 0);

    manager.stop();
}

#[tokio::test(start_paused = true)]
async fn extend_replaces_the_lease_deadline_outright() {
    let manager = started_manager();

    let ticket = manager.acquire("a", T * 10, T * 10).unwrap();

    assert!(manager.extend("a", ticket.id(), T * 30).unwrap());
    assert!(manager.extend("a", ticket.id(), T * 20).unwrap());

    // The second extension replaced the first; shrinking is allowed. On
    // the paused clock the remaining lease is exact.
    let state = manager.inspect("a").unwrap();
    assert_eq!(state.lock_timeout, T * 20);

    manager.stop();
}

#[tokio::test(start_paused = true)]
async fn stale_lease_timer_after_release_is_a_noop() {
    let manager = started_manager();

    let ticket_a = manager.acquire("a", T * 10, T * 10).unwrap();
    assert!(manager.release("a", ticket_a.id()).unwrap());

    // A fresh holder with a longer lease takes the same path.
    let ticket_b = manager.acquire("a", T * 10, T * 30).unwrap();

    // When the first holder's lease timer fires, maintenance must leave
    // the new holder alone.
    settle(11).await;
    assert_locked_by(&manager, "a", ticket_b.id());

    manager.stop();
}

#[tokio::test(start_paused = true)]
async fn inspect_reports_remaining_times() {
    let manager = started_manager();

    let ticket_a = manager.acquire("a", T * 10, T * 10).unwrap();
    let ticket_b = manager.acquire("a", T * 5, T * 10).unwrap();

    // On the paused clock no time has passed since acquisition.
    let state = manager.inspect("a").unwrap();
    assert_eq!(state.locking_id, ticket_a.id());
    assert_eq!(state.lock_timeout, T * 10);
    assert_eq!(state.acquirers.len(), 1);
    assert_eq!(state.acquirers[0].id, ticket_b.id());
    assert_eq!(state.acquirers[0].timeout, T * 5);

    tokio::time::sleep(T * 2).await;
    let state = manager.inspect("a").unwrap();
    assert_eq!(state.lock_timeout, T * 8);
    assert_eq!(state.acquirers[0].timeout, T * 3);

    // Unlocked paths snapshot as the zero state.
    let state = manager.inspect("b").unwrap();
    assert_eq!(state.locking_id, 0);
    assert!(state.acquirers.is_empty());

    manager.stop();
}

#[tokio::test(start_paused = true)]
async fn inspect_all_reports_every_held_lock() {
    let manager = started_manager();

    let ticket_a = manager.acquire("a", T * 10, T * 10).unwrap();
    let ticket_b = manager.acquire("b/c", T * 10, T * 10).unwrap();

    let states = manager.inspect_all();
    let paths: Vec<&str> = states.keys().map(String::as_str).collect();
    assert_eq!(paths, vec!["a", "b/c"]);
    assert_eq!(states["a"].locking_id, ticket_a.id());
    assert_eq!(states["b/c"].locking_id, ticket_b.id());

    settle(11).await;
    assert!(manager.inspect_all().is_empty());

    manager.stop();
}

#[tokio::test(start_paused = true)]
async fn stopped_manager_no_longer_expires_leases() {
    let manager = started_manager();
    manager.stop();

    let ticket_a = manager.acquire("a", T * 10, T * 2).unwrap();

    // The expiry flag is never drained once the worker has exited.
    settle(5).await;
    assert_locked_by(&manager, "a", ticket_a.id());

    // Explicit release still works in-line.
    assert!(manager.release("a", ticket_a.id()).unwrap());
    assert_locked_by(&manager, "a", 0);
}

#[tokio::test(start_paused = true)]
async fn start_is_idempotent() {
    let manager = started_manager();
    manager.start();

    let ticket_a = manager.acquire("a", T * 10, T * 2).unwrap();
    assert_locked_by(&manager, "a", ticket_a.id());

    settle(3).await;
    assert_locked_by(&manager, "a", 0);

    manager.stop();
}
