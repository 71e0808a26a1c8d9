//! Shopfront client library.
//!
//! Keeps local authentication state, the server-held cart and what the user
//! sees consistent across loads, tabs and login transitions.
//!
//! # Layers
//!
//! - [`session`] - persisted session fields, observable and shared across tabs
//! - [`gateway`] - the HTTP boundary; attaches credentials, maps failures
//! - [`api`] - one typed method per backend endpoint
//! - [`cart`] - the cart cache and the rules that keep it in step
//! - [`catalog`], [`orders`], [`dashboards`] - read-side services
//! - [`shop`] - the facade tying them together

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod dashboards;
pub mod error;
pub mod gateway;
pub mod orders;
pub mod session;
pub mod shop;

pub use cart::{CartState, CartSynchronizer, SyncPhase};
pub use config::{ClientConfig, ConfigError, UnauthorizedPolicy};
pub use error::{ClientError, ErrorKind};
pub use shop::{Registration, Shop};
