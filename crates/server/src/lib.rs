//! compose-status server: configuration and HTTP surface
//!
//! The binary wires these together with the scan loop from `status_lib`.

pub mod api;
pub mod config;
pub mod shutdown;
