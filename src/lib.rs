//! pixload - Async two-tier image loading for terminal UIs.
//!
//! This crate loads remote-identified images through a bounded in-memory
//! cache backed by an on-disk cache, using a small fixed pool of background
//! workers so the consuming UI context never blocks. Results are delivered
//! through a single serial dispatcher that re-validates each pending request
//! against a binding registry, so a display slot that has been reused for
//! different content never receives a stale image.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Domain layer containing entities and port definitions.
pub mod domain;
/// Infrastructure layer containing caches, the loader, and adapters.
pub mod infrastructure;

/// Current version of the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = "pixload";
