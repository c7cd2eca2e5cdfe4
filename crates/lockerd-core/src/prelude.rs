//! Convenience prelude for lock manager types.

pub use crate::config::ManagerConfig;
pub use crate::error::{LockError, LockResult};
pub use crate::manager::LockManager;
pub use crate::path::LockPath;
pub use crate::state::{LockAcquirerState, LockState};
pub use crate::ticket::Ticket;
