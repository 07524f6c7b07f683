//! Host abstraction for the Arbor coordinator.
//!
//! This crate owns *all* operating-system integration: file reads, file
//! sizes, case sensitivity, content hashing, and file/directory watching.
//! Higher layers depend only on the [`ServerHost`] trait and the stable
//! [`FileEventKind`] / [`WatchNotification`] model.
//!
//! # Watching
//!
//! Watches are identified by a [`WatchId`] and owned through a
//! [`WatcherHandle`]; dropping the handle cancels the watch, so a handle can
//! never outlive its owner. Hosts deliver changes as [`WatchNotification`]
//! values; the consumer routes each notification by the id it registered.
//!
//! Avoid tests that rely on real OS watcher timing; [`MemoryHost`] delivers
//! notifications synchronously and deterministically instead.

mod host;
mod local;
mod memory;
mod watch;

pub use host::{sha256_hex, ServerHost};
pub use local::LocalHost;
pub use memory::MemoryHost;
pub use watch::{
    FileEventKind, SharedWatchRegistry, WatchId, WatchNotification, WatcherHandle,
};
