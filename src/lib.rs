// src/lib.rs
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod files;
pub mod frontmatter;
pub mod query;
pub mod reconcile;
pub mod registry;
pub mod schema;
pub mod service;
pub mod sync;
pub mod watcher;

pub use config::AppConfig;
pub use engine::{IndexStore, PromptIndex, PromptIndexBuilder};
pub use error::{SyncError, SyncResult};
pub use files::FileStore;
pub use reconcile::{ReconcileReport, Reconciler};
pub use schema::PromptRecord;
pub use service::PromptService;
pub use sync::{IndexOutcome, Refresh, Synchronizer};
pub use watcher::{ChangeWatcher, FileEvent, FileEventKind, WatcherState};
