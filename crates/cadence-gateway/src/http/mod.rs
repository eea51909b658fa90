pub mod error;
pub mod habits;
pub mod health;
pub mod jobs;
pub mod profile;
pub mod tasks;
