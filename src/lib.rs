//! Mailbox session and batch-mutation engine over IMAP.
//!
//! [`Manager`] is the entry point: it owns one lazily opened [`Session`],
//! lists folders and recent messages through [`catalog`], and deletes or
//! moves messages through [`delete`], bulk deletes running in bounded
//! flag-and-expunge batches.

pub mod catalog;
pub mod config;
pub mod connection;
pub mod delete;
pub mod display;
pub mod error;
pub mod manager;
pub mod query;
pub mod session;

#[cfg(test)]
mod testing;

pub use catalog::MessageSummary;
pub use config::Settings;
pub use delete::{BatchProgress, BatchResult};
pub use error::{Error, Result};
pub use manager::{Manager, MessageSender};
pub use query::FilterCriteria;
pub use session::Session;
