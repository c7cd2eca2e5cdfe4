//! Acquisition tickets.

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

/// Handle for a single lock acquisition attempt.
///
/// A ticket eventually observes exactly one outcome: `true` when the lock
/// was acquired, `false` when the attempt timed out, was refused, or was
/// released before promotion. The ticket is not a guarantee that the lock
/// can be acquired in a timely fashion. It is safe to release the ticket
/// before the outcome has been consumed, no matter whether it was actually
/// acquired; in that case the ticket is guaranteed to observe `false`.
#[derive(Debug)]
pub struct Ticket {
    id: u64,
    outcome: Option<oneshot::Receiver<bool>>,
}

impl Ticket {
    /// Creates a ticket and the manager-side slot that resolves it.
    pub(crate) fn new(id: u64) -> (Self, OutcomeSlot) {
        let (tx, rx) = oneshot::channel();

        (
            Self {
                id,
                outcome: Some(rx),
            },
            OutcomeSlot(Some(tx)),
        )
    }

    /// Ticket id.
    ///
    /// Identifies the specific locking attempt or lease. Never zero.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Waits for the outcome of the acquisition attempt.
    ///
    /// Resolves to `true` if the lock was acquired and `false` otherwise.
    /// The outcome is consumed by the first call; calls after that resolve
    /// to `false` immediately.
    pub async fn acquired(&mut self) -> bool {
        match self.outcome.take() {
            Some(rx) => rx.await.unwrap_or(false),
            None => false,
        }
    }

    /// Non-blocking probe for the outcome.
    ///
    /// Returns `None` while the attempt is still undecided.
    pub fn try_acquired(&mut self) -> Option<bool> {
        let rx = self.outcome.as_mut()?;

        match rx.try_recv() {
            Ok(acquired) => {
                self.outcome = None;
                Some(acquired)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => {
                self.outcome = None;
                Some(false)
            }
        }
    }
}

/// Producer side of a ticket's outcome.
///
/// Fires at most once; later sends are ignored. Sending never blocks, so
/// the slot may be fired while the manager mutex is held.
#[derive(Debug)]
pub(crate) struct OutcomeSlot(Option<oneshot::Sender<bool>>);

impl OutcomeSlot {
    pub(crate) fn send(&mut self, acquired: bool) {
        if let Some(tx) = self.0.take() {
            // The consumer may already have walked away; the outcome is
            // then dropped on the floor.
            let _ = tx.send(acquired);
        }
    }
}
