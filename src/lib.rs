//! relaykit - relay-style GraphQL resolver helpers over SQLite
//!
//! - [`graphql`]: connection, search, mutation and batch-loading helpers
//! - [`orm`]: the model layer they build queries with
//! - [`blog`]: a sample schema wiring every helper together
//! - [`testing`]: request DSL for REST and GraphQL integration tests

pub mod api;
pub mod app;
pub mod blog;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod graphql;
pub mod logging;
pub mod orm;
pub mod testing;

pub use app::{AppState, build_app};
pub use error::{ResolverError, Result};
