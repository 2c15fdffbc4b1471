//! Shared helpers and fakes for unit tests
mod common;
mod fake_backup;
mod fake_remote;

pub use common::*;
pub use fake_backup::*;
pub use fake_remote::*;
