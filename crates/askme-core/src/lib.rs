//! Ask Me Core — configuration and the shared error type.

pub mod config;
pub mod error;

pub use config::{AskMeConfig, DataPaths, OllamaConfig, PostgresConfig, StoreBackend, TableConfig};
pub use error::{Error, Result};
