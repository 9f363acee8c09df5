//! # CLI Behavior
//!
//! One possible host for kartoteka. The desktop shell that normally drives the
//! storage layer is another; both build the same context and call the same façade.
//!
//! ## Degraded Saves
//!
//! A save that only reached the fallback store still succeeds. The CLI prints the
//! record and adds a warning line on stderr naming why the data folder was skipped.
//! Only a failed fallback write is an error.
//!
//! ## Ids
//!
//! Numeric arguments are treated as legacy numeric ids, anything else as a string
//! id, matching how the documents store them.

mod commands;
mod render;
mod setup;

pub use commands::run;
