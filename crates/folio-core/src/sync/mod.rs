//! Notebook synchronization
//!
//! [`SyncCoordinator`] owns the apply-patch state machine. Every write takes
//! the target notebook's lock, runs in one immediate transaction, and
//! reports the domain events it committed so observers can react afterwards.

mod coordinator;
mod events;
mod locks;
mod outcome;
mod session;


pub use coordinator::SyncCoordinator;
pub use events::{SyncEvent, SyncObserver, SyncReport, TracingObserver};
pub use locks::DocumentLocks;
pub use outcome::{PatchOutcome, ResolveOutcome, SessionStart, SyncStatus};
pub use session::SessionManager;
