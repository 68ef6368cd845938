//! `carsharing` - A rental car catalog backed by a flat JSON file
//!
//! This library provides the record model for cars and trips, the JSON store,
//! read-only queries, the mutation operations that tie them together, and an
//! HTTP transport exposing them.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod model;
pub mod query;
pub mod store;

pub use catalog::{Catalog, SharedCatalog};
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use model::{Car, Trip, ValidationError};
pub use query::CarFilter;
pub use store::{CarStore, JsonFileStore, MemoryStore};
