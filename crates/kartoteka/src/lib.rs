//! # Kartoteka Architecture
//!
//! Kartoteka is the **persistence core of a small clinic's records app**: patients,
//! staff, appointments, medical reports and the examination price list, kept as
//! plain JSON documents in a folder the user picks. It is a library first. The
//! `kartoteka` binary is just one host; a desktop shell or a server could be another.
//!
//! ## The Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Host (CLI, desktop shell)                                  │
//! │  - Builds a KartotekaContext, owns stdout/stderr/exit codes │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Façade (service/)                                          │
//! │  - DataStorage: state machine, read-through, dual write     │
//! │  - Per-collection locks, audit trail, backups               │
//! │  - Autosave (autosave.rs) sits beside it for form drafts    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage (store/)                                           │
//! │  - FileBridge: FsBridge, MemBridge, DisabledBridge          │
//! │  - JSON I/O, folder layout, system log                      │
//! │  - FallbackStore: JsonFileFallback, MemoryFallback          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Two Stores, No Transactions
//!
//! Every save goes to the fallback key-value store first and to the data folder
//! second. The fallback copy is never behind the last write; the folder copy is
//! best effort. Reads prefer the folder and fall back to the key-value copy, so a
//! missing or broken file never looks like an empty collection. The façade never
//! returns storage errors: reads give a best-effort collection, saves give a
//! [`service::SaveOutcome`] saying how far the write got.
//!
//! ## Testing Strategy
//!
//! 1. **Model** (`model/*.rs`): status transitions, schema upgrades, password hashing.
//! 2. **Store** (`store/*.rs`): layout, JSON I/O and the system log over [`store::MemBridge`].
//! 3. **Façade** (`service/*.rs`): dual-write behavior over `MemBridge` and
//!    [`store::MemoryFallback`]. `MemBridge` counts calls, so tests can check that a
//!    fallback-only service never touched the bridge.
//! 4. **Integration** (`tests/`): the same flows over [`store::FsBridge`] in a temp dir.
//!
//! ## Module Overview
//!
//! - [`service`]: the `DataStorage` façade
//! - [`autosave`]: debounced form autosave with offline drafts
//! - [`store`]: file bridge, JSON I/O, layout, system log, fallback store
//! - [`model`]: records and their state machines
//! - [`config`]: layered configuration
//! - [`init`]: production context wiring
//! - [`error`]: error types

pub mod autosave;
pub mod config;
pub mod error;
pub mod init;
pub mod model;
pub mod service;
pub mod store;

pub use error::{KartotekaError, Result};
pub use service::{DataStorage, DegradedReason, FailureReason, SaveOutcome, Saved, ServiceState};
