//! Local, continuously-updated mirror of an Apollo configuration service.
//!
//! An [`AppClient`] keeps every namespace of one application in memory,
//! refreshes it through a long-poll loop, falls back to on-disk snapshots
//! when the service is unreachable and fans out [`ChangeEvent`]s to any
//! number of subscribers. [`ClientRegistry`] shares one client per endpoint
//! and application.

mod backup;
mod client;
mod config;
mod constants;
mod errors;
mod namespace;
mod network;
mod sync;
mod utils;
pub mod watch;

pub use backup::*;
pub use client::*;
pub use config::*;
pub use constants::CONTENT_KEY;
pub use constants::DEFAULT_CLUSTER;
pub use constants::DEFAULT_NAMESPACE;
pub use errors::*;
pub use namespace::*;
pub use network::*;
pub use sync::*;
pub(crate) use utils::*;
pub use watch::ChangeEvent;
pub use watch::ChangeType;
pub use watch::ConfigChange;
pub use watch::Subscription;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
