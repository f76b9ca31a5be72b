pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
pub mod telemetry;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use engine::DiscoveryEngine;
pub use error::{DiscoveryError, Rejection, StorageError};
pub use models::{AuthInfo, Listing, Principal};
pub use storage::{DiscoveryStore, InMemoryStore, PgDiscoveryStore};
