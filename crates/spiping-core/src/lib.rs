//! spiping-core - SPI master transaction engine
//!
//! This crate provides the transaction state machine behind `spiping`: it
//! asserts chip select, exchanges a fixed-size message over a bus transport,
//! validates the reply and reports the result, one cycle at a time. It is
//! `no_std` compatible for use on microcontrollers.
//!
//! # Features
//!
//! - `is_sync` (default) - Blocking transport traits and engine
//! - `std` - Enable standard library support (includes `alloc`)
//! - `alloc` - Enable boxed transport trait objects
//!
//! # Example
//!
//! ```ignore
//! use spiping_core::engine::Engine;
//! use spiping_core::profile::LOOPBACK;
//! use spiping_core::transport::{BusTransport, ChipSelect};
//!
//! fn self_test<T: BusTransport, C: ChipSelect>(bus: T, cs: C) {
//!     let mut engine = Engine::with_chip_select(
//!         LOOPBACK.config,
//!         bus,
//!         cs,
//!         LOOPBACK.message,
//!         LOOPBACK.policy,
//!     )
//!     .unwrap();
//!
//!     let result = engine.run_once();
//!     println!("loopback passed: {}", result.passed());
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
// Allow async fn in traits - we use maybe-async for dual sync/async support
#![allow(async_fn_in_trait)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod config;
pub mod engine;
pub mod error;
pub mod message;
pub mod profile;
pub mod report;
pub mod transport;
pub mod validate;

pub use config::{BitOrder, CsStrategy, SpiMode, TransactionConfig, TransferFlags};
pub use engine::Engine;
pub use error::{ConfigError, Error, ErrorCode, Result};
pub use message::Message;
pub use report::{CycleReport, TransactionResult, TransactionStatus};
pub use validate::{ValidationOutcome, ValidationPolicy};
