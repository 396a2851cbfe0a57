//! CLI command handlers.

pub mod common;
pub mod manifest;
pub mod simulate;
pub mod state;
