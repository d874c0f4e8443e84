pub mod analyzer;
pub mod app;
pub mod cli;
pub mod collab;
pub mod config;
pub mod core;
pub mod error;
pub mod pipeline;
pub mod security;
pub mod skills;
pub mod storage;

pub use error::{Result, SgError};

/// Package version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
