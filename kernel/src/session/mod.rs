//! Session lifecycle.
//!
//! Sessions are isolated workspace directories inside one shared execution
//! environment. This module owns their creation, lookup, expiry, capacity
//! eviction, the current-session pointer, and scoped acquisition for tool
//! operations.

pub mod clock;
pub mod context;
pub mod current;
pub mod janitor;
pub mod registry;
pub mod store;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{AcquirePolicy, SessionContext, SessionLease, Workspace};
pub use current::CurrentSession;
pub use janitor::{Janitor, JanitorHandle};
pub use registry::SessionRegistry;
pub use store::{CurrentSessionStore, MarkerFileStore, NoPersistence};
pub use types::{SessionError, SessionId, SessionRecord};
