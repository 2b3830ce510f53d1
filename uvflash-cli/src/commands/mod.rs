//! Command implementations.
//!
//! Each subcommand is implemented in its own module for clean separation.

pub(crate) mod decode;
pub(crate) mod image;
pub(crate) mod transfer;
