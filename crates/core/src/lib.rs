//! Stock Sync Core - Shared domain types.
//!
//! This crate provides the types used across all Stock Sync components:
//! - `app` - Shopify embedded app backend (OAuth, webhooks, sync API)
//! - `cli` - Command-line tools for migrations and store management
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no database
//! access, no HTTP clients. The linkage invariants (no self-links, unique
//! children) live here so every caller enforces them the same way.
//!
//! # Modules
//!
//! - [`types`] - Newtypes for shops, products, namespaces, linkages and sync reports

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
