//! Inspection snapshots of lock state.

use std::time::Duration;

/// Snapshot of one waiting acquirer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockAcquirerState {
    /// Ticket id of the waiter.
    pub id: u64,

    /// Time left until the waiter gives up acquiring.
    pub timeout: Duration,
}

/// Snapshot of a single lock queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockState {
    /// Ticket id holding the lock.
    ///
    /// Zero if the lock is not currently held.
    pub locking_id: u64,

    /// Time left on the holder's lease.
    pub lock_timeout: Duration,

    /// Waiting acquirers in arrival order.
    pub acquirers: Vec<LockAcquirerState>,
}
