pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod engine;
pub mod logging;
pub mod openapi;
pub mod rule_seed;
pub mod state;

#[cfg(test)]
mod tests;
