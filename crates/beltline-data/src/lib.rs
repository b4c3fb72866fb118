//! Data-file loading for beltline factories.
//!
//! A data directory holds a `catalog` file (items and recipes) and an
//! optional `transport` file (tuning), each in RON, TOML or JSON.

pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, FactoryData, load_factory_data};
