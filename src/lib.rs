//! Display topology model: GPUs, X screens, displays and their modes,
//! parsed from and serialized back to the server's configuration strings.

#![forbid(unsafe_code)]

pub mod config;
pub mod constants;
pub mod errors;
pub mod geometry;
pub mod layout;
pub mod parse;
pub mod query;
pub mod serialize;
pub mod underscan;

pub use errors::{LayoutError, Result};
pub use layout::{build_layout, BuildOutcome, Layout};
