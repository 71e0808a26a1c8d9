//! Command implementations.
//!
//! Each command prints its result to stdout; progress and failures go
//! through `tracing`.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod dashboard;
pub mod orders;
