//! Host state and tool operations.
//!
//! [`HostState`] wires the execution environment, the session layer and the
//! host transfer roots together; the tool operations are methods on it.

pub mod state;
pub mod tools;

pub use state::HostState;
pub use tools::SessionSummary;
