//! Shared wire types for the vmdash alert backend.
//!
//! Every crate in the workspace exchanges [`types::Alert`] records in the
//! exact shape persisted by the store and pushed over the realtime feed.

pub mod id;
pub mod types;

#[cfg(test)]
mod tests;
