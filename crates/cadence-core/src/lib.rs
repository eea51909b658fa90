//! `cadence-core`: configuration, shared error type, and the domain records
//! (tasks, habits, user profiles) every other crate passes around.

pub mod config;
pub mod error;
pub mod reminder;
pub mod types;
