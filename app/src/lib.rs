//! # Lumen App
//!
//! Headless front-end for the Lumen render graph. It registers the standard
//! passes, builds the MIS tracer or ReSTIR graph through the same calls a
//! configuration script would make, compiles it and executes a fixed number of
//! frames.
//!
//! ## Example
//!
//! ```ignore
//! use clap::Parser;
//! use lumen_app::{App, AppArgs};
//!
//! let args = AppArgs::parse();
//! App::new(args).run(&mut std::io::stdout())?;
//! ```

mod app;
mod args;

pub use app::{App, AppError, RunSummary};
pub use args::{AppArgs, CliFailurePolicy, GraphChoice};

/// App library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the app subsystem.
pub fn init() {
    log::info!("Lumen App v{} initialized", VERSION);
}
