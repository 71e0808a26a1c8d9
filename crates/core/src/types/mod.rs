//! Core types for Shopfront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod credential;
pub mod email;
pub mod id;
pub mod price;
pub mod role;
pub mod status;

pub use credential::Credentials;
pub use email::{Email, EmailError};
pub use id::*;
pub use price::{format_money, zero};
pub use role::{Capability, Role, RoleParseError};
pub use status::*;
