//! The lock manager.
//!
//! Manages all available locks by path. Every mutation happens behind one
//! coarse mutex covering the whole queue map, the ticket-id counter, and
//! the pending-maintenance set, so the mutex-acquisition order is the
//! observable order of operations.
//!
//! To avoid a large amount of updates to contended locks, maintenance
//! (the timing out of leases and waiting acquisitions) is performed in
//! batches at a configurable interval, unless an explicit release makes
//! the post-release state observable immediately. Timers are
//! fire-and-forget: they only flag a path for the next maintenance pass,
//! and a stale timer firing after an extension or release finds nothing
//! due and leaves the queue untouched.
//!
//! The manager arms its timers on the ambient Tokio runtime; all
//! operations must be called from within one.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::config::ManagerConfig;
use crate::error::LockResult;
use crate::path::LockPath;
use crate::state::{LockAcquirerState, LockState};
use crate::ticket::{OutcomeSlot, Ticket};

/// One record in a lock queue.
///
/// The head of a queue is the current holder iff its lease deadline is
/// set; every other record is a waiter with an acquire deadline.
#[derive(Debug)]
struct QueueEntry {
    id: u64,
    outcome: OutcomeSlot,

    /// Lease applied when this entry becomes the holder.
    first_lease: Duration,

    /// Set iff the entry is waiting to acquire.
    acquire_deadline: Option<Instant>,

    /// Set iff the entry holds the lock.
    lease_deadline: Option<Instant>,
}

impl QueueEntry {
    fn is_holder(&self) -> bool {
        self.lease_deadline.is_some()
    }
}

/// Mutable manager state. A queue is present in `locks` iff it is
/// non-empty.
struct ManagerState {
    locks: HashMap<LockPath, Vec<QueueEntry>>,
    next_ticket_id: u64,
    pending_maintenance: HashSet<LockPath>,
    stop: Option<watch::Sender<bool>>,
}

struct ManagerInner {
    state: Mutex<ManagerState>,
    maintenance_interval: Duration,
}

/// The authority over every named lock.
///
/// Cloning is cheap and every clone operates on the same shared state.
/// For timeouts to function, maintenance must be started with
/// [`start`](LockManager::start) and eventually stopped with
/// [`stop`](LockManager::stop).
#[derive(Clone)]
pub struct LockManager {
    inner: Arc<ManagerInner>,
}

impl LockManager {
    /// Creates a manager from the given configuration.
    pub fn new(config: ManagerConfig) -> Self {
        let maintenance_interval = if config.maintenance_interval.is_zero() {
            ManagerConfig::default().maintenance_interval
        } else {
            config.maintenance_interval
        };

        // Seed the ticket counter randomly so ids are unpredictable
        // across restarts.
        let next_ticket_id = rand::random::<u64>();

        Self {
            inner: Arc::new(ManagerInner {
                state: Mutex::new(ManagerState {
                    locks: HashMap::new(),
                    next_ticket_id,
                    pending_maintenance: HashSet::new(),
                    stop: None,
                }),
                maintenance_interval,
            }),
        }
    }

    /// Starts the maintenance worker.
    ///
    /// Idempotent: calling `start` while the worker is already running is
    /// a no-op.
    pub fn start(&self) {
        let mut state = self.inner.state.lock();
        if state.stop.is_some() {
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        state.stop = Some(stop_tx);
        drop(state);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(run_maintenance(inner, stop_rx));
    }

    /// Signals the maintenance worker to exit at its next wake-up.
    ///
    /// Returns without waiting for the worker. In-flight operations
    /// complete normally; timers may still fire afterwards, and their
    /// flags are simply never drained.
    pub fn stop(&self) {
        let mut state = self.inner.state.lock();
        if let Some(stop) = state.stop.take() {
            let _ = stop.send(true);
        }
    }

    /// Acquires a lock.
    ///
    /// Waits at most `lock_timeout` for the lock to become free, then
    /// holds it for `lease_timeout` unless extended or released. A zero
    /// `lock_timeout` refuses immediately instead of queueing when the
    /// lock is contended. Callers should pass a `lease_timeout` greater
    /// than zero; a zero lease is already due and expires at the next
    /// maintenance pass.
    ///
    /// The returned [`Ticket`] reports the single outcome of the attempt;
    /// this method itself never blocks on the outcome.
    pub fn acquire(
        &self,
        path: &str,
        lock_timeout: Duration,
        lease_timeout: Duration,
    ) -> LockResult<Ticket> {
        let path = LockPath::parse(path)?;

        let mut state = self.inner.state.lock();

        // Id zero is reserved as "not locked" in inspection replies.
        if state.next_ticket_id == 0 {
            state.next_ticket_id = 1;
        }
        let id = state.next_ticket_id;
        state.next_ticket_id = state.next_ticket_id.wrapping_add(1);

        let (ticket, outcome) = Ticket::new(id);
        let mut entry = QueueEntry {
            id,
            outcome,
            first_lease: lease_timeout,
            acquire_deadline: None,
            lease_deadline: None,
        };

        match state.locks.entry(path.clone()) {
            Entry::Vacant(slot) => {
                // The new head acquires immediately.
                let deadline = Instant::now() + lease_timeout;
                entry.lease_deadline = Some(deadline);
                entry.outcome.send(true);
                slot.insert(vec![entry]);

                debug!(path = %path, id, lease = ?lease_timeout, "lock acquired");
                arm_timer(&self.inner, path, deadline);
            }
            Entry::Occupied(_) if lock_timeout.is_zero() => {
                // The caller does not want to wait.
                entry.outcome.send(false);
                trace!(path = %path, id, "no-wait acquisition refused");
            }
            Entry::Occupied(mut slot) => {
                let deadline = Instant::now() + lock_timeout;
                entry.acquire_deadline = Some(deadline);
                slot.get_mut().push(entry);

                trace!(path = %path, id, timeout = ?lock_timeout, "waiting to acquire");
                arm_timer(&self.inner, path, deadline);
            }
        }

        Ok(ticket)
    }

    /// Releases a lock.
    ///
    /// If the id belongs to the current holder, the lock is freed and the
    /// next waiter (if any) is promoted before this call returns. If the
    /// id belongs to a ticket still waiting to acquire, the ticket
    /// observes a failed acquisition and leaves the queue. Returns whether
    /// the id was found.
    pub fn release(&self, path: &str, id: u64) -> LockResult<bool> {
        let path = LockPath::parse(path)?;

        let mut state = self.inner.state.lock();
        let Some(mut queue) = state.locks.remove(&path) else {
            return Ok(false);
        };

        let mut found = false;
        queue.retain_mut(|entry| {
            if entry.id != id {
                return true;
            }

            found = true;
            if !entry.is_holder() {
                // Not yet the head, so the pending outcome must still be
                // delivered.
                entry.outcome.send(false);
            }
            false
        });

        if !queue.is_empty() {
            state.locks.insert(path.clone(), queue);
            // Promote in-line so callers observe the post-release state
            // immediately rather than at the next maintenance tick.
            maintain_path(&self.inner, &mut state, &path);
        }

        if found {
            debug!(path = %path, id, "lock released");
        }

        Ok(found)
    }

    /// Extends a lease.
    ///
    /// Only the current holder may extend. The new deadline replaces the
    /// old one unconditionally, so a lease can be shortened as well as
    /// lengthened. Returns whether the lease was found and extended.
    pub fn extend(&self, path: &str, id: u64, lease_timeout: Duration) -> LockResult<bool> {
        let path = LockPath::parse(path)?;

        let mut state = self.inner.state.lock();
        let Some(head) = state.locks.get_mut(&path).and_then(|queue| queue.first_mut()) else {
            return Ok(false);
        };

        if head.id != id {
            return Ok(false);
        }

        let deadline = Instant::now() + lease_timeout;
        head.lease_deadline = Some(deadline);

        debug!(path = %path, id, lease = ?lease_timeout, "lease extended");
        arm_timer(&self.inner, path, deadline);

        Ok(true)
    }

    /// Tests whether a path is locked.
    ///
    /// Returns the id of the ticket holding the lock, or zero if the path
    /// is not locked.
    pub fn is_locked(&self, path: &str) -> LockResult<u64> {
        let path = LockPath::parse(path)?;

        let state = self.inner.state.lock();
        Ok(state
            .locks
            .get(&path)
            .and_then(|queue| queue.first())
            .map(|head| head.id)
            .unwrap_or(0))
    }

    /// Snapshots the state of a single lock queue.
    ///
    /// Returns the zero [`LockState`] when the path is not locked.
    pub fn inspect(&self, path: &str) -> LockResult<LockState> {
        let path = LockPath::parse(path)?;

        let state = self.inner.state.lock();
        Ok(state
            .locks
            .get(&path)
            .map(|queue| snapshot_queue(queue))
            .unwrap_or_default())
    }

    /// Snapshots the state of every held lock, keyed by path.
    pub fn inspect_all(&self) -> BTreeMap<String, LockState> {
        let state = self.inner.state.lock();
        state
            .locks
            .iter()
            .map(|(path, queue)| (path.as_str().to_string(), snapshot_queue(queue)))
            .collect()
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}

/// Arms a fire-and-forget timer that flags `path` for maintenance at
/// `deadline`.
///
/// Release may run from a `Drop` impl while the runtime is shutting
/// down; with no runtime left there is nothing to expire, so the timer
/// is skipped.
fn arm_timer(inner: &Arc<ManagerInner>, path: LockPath, deadline: Instant) {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        return;
    };

    let inner = Arc::clone(inner);
    handle.spawn(async move {
        tokio::time::sleep_until(deadline).await;
        inner.state.lock().pending_maintenance.insert(path);
    });
}

/// The maintenance worker loop.
///
/// Each pass drains the pending-maintenance set and recomputes the
/// flagged paths in one batch under the mutex.
async fn run_maintenance(inner: Arc<ManagerInner>, stop: watch::Receiver<bool>) {
    loop {
        tokio::time::sleep(inner.maintenance_interval).await;

        {
            let mut state = inner.state.lock();
            let pending = std::mem::take(&mut state.pending_maintenance);
            for path in &pending {
                maintain_path(&inner, &mut state, path);
            }
        }

        if *stop.borrow() {
            return;
        }
    }
}

/// Applies expiry and promotion rules for one path.
///
/// Assumes exclusive access to the manager state. Expired holders are
/// dropped silently (they already observed `true`), waiters that ran out
/// of time observe `false`, and a surviving head without a lease is
/// promoted. A waiter whose acquire deadline has already passed at the
/// moment the prior holder goes away is dropped rather than promoted.
fn maintain_path(inner: &Arc<ManagerInner>, state: &mut ManagerState, path: &LockPath) {
    let Some(queue) = state.locks.remove(path) else {
        return;
    };

    let now = Instant::now();
    let mut survivors: Vec<QueueEntry> = Vec::with_capacity(queue.len());

    for mut entry in queue {
        match (entry.lease_deadline, entry.acquire_deadline) {
            // Holders stay in place until their lease runs out.
            (Some(lease), _) if lease > now => survivors.push(entry),
            (Some(_), _) => {
                debug!(path = %path, id = entry.id, "lease expired");
            }
            // Waiting acquisitions stay in play until their timeout.
            (None, Some(acquire)) if acquire > now => survivors.push(entry),
            (None, _) => {
                entry.outcome.send(false);
                debug!(path = %path, id = entry.id, "acquisition timed out");
            }
        }
    }

    // Promote the head if the prior holder is gone.
    if let Some(head) = survivors.first_mut() {
        if !head.is_holder() {
            let deadline = now + head.first_lease;
            head.lease_deadline = Some(deadline);
            head.acquire_deadline = None;
            head.outcome.send(true);

            debug!(path = %path, id = head.id, lease = ?head.first_lease, "lock acquired");
            arm_timer(inner, path.clone(), deadline);
        }
    }

    if !survivors.is_empty() {
        state.locks.insert(path.clone(), survivors);
    }
}

/// Builds an inspection snapshot of one queue. Remaining times are
/// clamped to zero.
fn snapshot_queue(queue: &[QueueEntry]) -> LockState {
    let now = Instant::now();
    let mut snapshot = LockState::default();

    let Some(head) = queue.first() else {
        return snapshot;
    };

    snapshot.locking_id = head.id;
    if let Some(deadline) = head.lease_deadline {
        snapshot.lock_timeout = deadline.saturating_duration_since(now);
    }
    snapshot.acquirers = queue[1..]
        .iter()
        .map(|entry| LockAcquirerState {
            id: entry.id,
            timeout: entry
                .acquire_deadline
                .map(|deadline| deadline.saturating_duration_since(now))
                .unwrap_or_default(),
        })
        .collect();

    snapshot
}
