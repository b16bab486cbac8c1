//! Wikigraph Watcher: Filesystem watching and per-path change coalescing

pub mod coalescer;
pub mod watcher;

pub use coalescer::ChangeCoalescer;
pub use watcher::{FileWatcher, WatchEvent, WatcherService};
