//! Persistent alert storage.
//!
//! [`store::AlertStore`] wraps a SeaORM connection (SQLite or PostgreSQL),
//! runs the schema migrations on startup and implements
//! [`vmdash_alert::AlertRepository`] with compare-and-set status updates.

pub mod entities;
pub mod error;
pub mod store;

#[cfg(test)]
mod tests;

pub use store::{AlertFilter, AlertStore, NotificationLogRow};
