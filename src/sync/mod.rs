//! Background synchronization with the remote configuration service.
//!
//! ```text
//!            start()
//!   Idle ─────────────► Polling ◄──────────────┐
//!    ▲  no namespaces     │   │                │
//!    └────────────────────┘   ├─ changed ─► Fetching
//!                             │                │ fetch failure
//!                             │                ▼
//!                             └─ failure ─► BackingOff
//!
//!   any state ── stop() ──► Stopped
//! ```

mod backoff;
mod error_stream;
mod synchronizer;
pub(crate) use backoff::*;
pub use error_stream::*;
pub use synchronizer::*;


/// Observable state of a client's synchronization loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncPhase {
    /// Not started, or started with nothing to poll
    Idle,
    /// Waiting on the notification endpoint
    Polling,
    /// Downloading namespaces reported as changed
    Fetching,
    /// Waiting out a failure before polling again
    BackingOff,
    /// Terminal
    Stopped,
}
