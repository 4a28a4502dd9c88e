//! Core types for Stock Sync.
//!
//! This module provides type-safe wrappers for the domain concepts shared by
//! the app and the CLI.

pub mod linkage;
pub mod namespace;
pub mod product;
pub mod report;
pub mod shop;

pub use linkage::{LinkageError, ProductLinkage, SyncState};
pub use namespace::{LinkageField, Namespace};
pub use product::{ProductId, ProductIdError};
pub use report::{ChildOutcome, ChildStatus, InventoryQuantity, QuantityError, SyncReport, SyncStatus};
pub use shop::{ShopDomain, ShopDomainError, ShopId, ShopIdError};
