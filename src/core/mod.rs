//! Core traits, types, and constants.
//!
//! This module provides the capability traits the ingestion pipeline is built
//! around (decode, accumulate, publish) together with the shared error types.
//! It has no dependency on the async runtime.

mod constants;
mod error;
mod traits;

pub use constants::*;
pub use error::*;
pub use traits::*;
