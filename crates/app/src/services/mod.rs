//! Business logic services.
//!
//! - [`store_sessions`] - per-shop cache of resolved stores and clients
//! - [`sync`] - the sync-master propagation engine

pub mod store_sessions;
pub mod sync;

pub use store_sessions::{StoreSession, StoreSessionError, StoreSessions};
pub use sync::{Designation, SchemaReport, SyncEngine, SyncError};
