//! # Storage Layer
//!
//! Two peer stores sit under the façade in [`crate::service`]:
//!
//! 1. **Fallback store** ([`fallback`]): a flat key-value map. Always written.
//! 2. **File backend**: a tree of JSON documents under a user-chosen data folder,
//!    reached through a [`bridge::FileBridge`]. Written when available.
//!
//! Neither is the designated source of truth. The fallback copy is never stale
//! relative to the last write this process made; the file copy is best effort.
//!
//! ## Layers
//!
//! ```text
//! bridge.rs      raw file operations (exists, read, write, mkdir, list, copy, archive, delete)
//! json_io.rs     whole-document JSON with default-on-missing reads
//! layout.rs      fixed folder taxonomy, index documents, patient folders
//! system_log.rs  capped action log
//! fallback.rs    key-value fallback store
//! ```
//!
//! ## Implementations
//!
//! - [`fs_bridge::FsBridge`]: production bridge over `std::fs`.
//! - [`mem_bridge::MemBridge`]: in-memory bridge for tests, with call counting
//!   and write-error simulation.
//! - [`bridge::DisabledBridge`]: for hosts without file access.

pub mod bridge;
pub mod fallback;
pub mod fs_bridge;
pub mod json_io;
pub mod layout;
pub mod mem_bridge;
pub mod system_log;

pub use bridge::{DisabledBridge, FileBridge};
pub use fallback::{FallbackStore, JsonFileFallback, MemoryFallback};
pub use fs_bridge::FsBridge;
pub use layout::Layout;
pub use mem_bridge::MemBridge;
