//! `cadence-store`: the document-tree persistence layer.
//!
//! Data lives in a tree addressed by slash-separated paths:
//!
//! | Path                | Contents                        |
//! |---------------------|---------------------------------|
//! | `tasks/{id}`        | [`Task`](cadence_core::types::Task)        |
//! | `habits/{id}`       | [`Habit`](cadence_core::types::Habit)      |
//! | `users/{id}`        | [`UserProfile`](cadence_core::types::UserProfile) |
//!
//! Two [`DocumentStore`] backends are provided: [`MemoryStore`] keeps the
//! whole tree in a `serde_json::Value`, [`SqliteStore`] keeps one row per
//! document.

pub mod db;
pub mod document;
pub mod error;
pub mod memory;
pub mod repo;
pub mod sqlite;
pub mod tree;
pub mod users;

pub use document::DocumentStore;
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use users::{StoreUserDirectory, UserDirectory};
