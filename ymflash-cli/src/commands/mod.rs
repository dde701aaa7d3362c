//! Command implementations.
//!
//! Each subcommand is implemented in its own module.

pub(crate) mod claim;
pub(crate) mod completions;
pub(crate) mod identify;
pub(crate) mod mac;
pub(crate) mod monitor;
pub(crate) mod ports;
pub(crate) mod send;
pub(crate) mod wifi;
