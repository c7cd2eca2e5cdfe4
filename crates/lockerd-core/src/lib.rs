//! Core lock manager for the lockerd lock service.
//!
//! Remote clients acquire named exclusive locks, hold them for a bounded
//! lease, optionally extend the lease, and either release them explicitly
//! or let them expire. This crate is the authority behind those
//! operations: it owns every lock queue, serializes all mutations behind
//! a single mutex, and runs a batched maintenance worker that expires
//! holders and waiters and promotes the next acquirer in FIFO order.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use lockerd_core::{LockManager, ManagerConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = LockManager::new(ManagerConfig::default());
//!     manager.start();
//!
//!     // Acquire a lock, waiting up to five seconds, with a one minute lease.
//!     let mut ticket = manager
//!         .acquire("jobs/reindex", Duration::from_secs(5), Duration::from_secs(60))
//!         .unwrap();
//!
//!     if ticket.acquired().await {
//!         // Critical section - we hold the lock.
//!         manager.release("jobs/reindex", ticket.id()).unwrap();
//!     }
//!
//!     manager.stop();
//! }
//! ```

pub mod config;
pub mod error;
pub mod manager;
pub mod path;
pub mod prelude;
pub mod state;
pub mod ticket;

pub use config::ManagerConfig;
pub use error::{LockError, LockResult};
pub use manager::LockManager;
pub use path::LockPath;
pub use state::{LockAcquirerState, LockState};
pub use ticket::Ticket;
