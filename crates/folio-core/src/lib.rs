//! folio-core - Core library for Folio
//!
//! This crate contains the patch codec, the three-way merge engine, the
//! SQLite-backed stores and the sync coordinator that lets many users edit
//! one notebook concurrently without losing updates.

pub mod config;
pub mod db;
pub mod error;
pub mod merge;
pub mod models;
pub mod patch;
pub mod protocol;
pub mod roles;
pub mod services;
pub mod sync;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use merge::{three_way_merge, MergeOutcome};
pub use models::{ConflictId, NotebookId, SessionToken, UserId, WorkspaceId};
pub use services::SyncService;
pub use sync::{PatchOutcome, SyncCoordinator, SyncStatus};
