//! CLI command implementations
//!
//! ## Run
//!
//! The `run` module resolves the CLI flags against a built-in profile, opens
//! the transport and chip select line, and drives the engine periodically.
//!
//! ## List
//!
//! Prints the transports compiled into this binary and the built-in profiles.

mod list;
pub mod run;

pub use list::list;
