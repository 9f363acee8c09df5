//! # Kartoteka CLI
//!
//! A thin terminal host for the `kartoteka` library. Everything that touches the
//! records goes through [`kartoteka::DataStorage`]; this crate only parses
//! arguments, sets up logging and prints results.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (src/cli/)                                       │
//! │  - clap argument parsing (setup.rs)                         │
//! │  - Logging, context wiring, dispatch (commands.rs)          │
//! │  - Plain-text output (render.rs)                            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  kartoteka::init + kartoteka::service                       │
//! │  - Config, fallback store, file bridge, DataStorage façade  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Logs go to stderr, results to stdout, so `kartoteka types export > cjenik.json`
//! stays clean. Any error ends the process with `Error: ...` and exit code 1.

mod cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
