//! # Trellis
//!
//! Application layer over `trellis-core`: the definitions file loader, the
//! demo shop objects, the HTTP API and the CLI.

pub mod api;
pub mod cli;
pub mod definitions;
pub mod shop;
