//! Async service layer for embedding hosts

mod sync_service;

pub use sync_service::SyncService;
