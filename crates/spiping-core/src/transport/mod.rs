//! Bus transport abstractions
//!
//! This module defines the collaborator traits the engine drives: the
//! `BusTransport` that moves bytes and the `ChipSelect` line it may toggle.

pub mod bitbang;
mod traits;

pub use bitbang::{BitbangPins, BitbangTransport};
pub use traits::*;
