//! Public entry points of the configuration mirror
//!
//! - [`AppClient`] - one application's mirror: reads, lifecycle, change notification
//! - [`ClientBuilder`] - configurable client construction
//! - [`ClientRegistry`] - one shared client per endpoint and application
//!
//! # Basic Usage
//! ```no_run
//! use apollo_mirror::{ClientRegistry, ReadOptions};
//! use apollo_mirror::ClientBuilder;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let registry = ClientRegistry::new();
//!     let config = ClientBuilder::new("http://localhost:8080", "SampleApp")
//!         .preload_namespaces(["application", "TEST.Namespace"])
//!         .into_config();
//!     let client = registry.get_or_create(config).unwrap();
//!
//!     let mut errors = client.start().await.unwrap();
//!     tokio::spawn(async move {
//!         while let Some(e) = errors.recv().await {
//!             eprintln!("config sync error: {e}");
//!         }
//!     });
//!
//!     let timeout = client.get("timeout", ReadOptions::default().with_default("30s")).await;
//!     println!("timeout = {:?}", timeout);
//!
//!     let mut changes = client.watch_namespace("application", None);
//!     while let Some(event) = changes.recv().await {
//!         for change in event.changes() {
//!             println!("{:?}", change);
//!         }
//!     }
//! }
//! ```

mod app_client;
mod builder;
mod registry;

pub use app_client::*;
pub use builder::*;
pub use registry::*;
