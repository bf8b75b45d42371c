//! Error types for rig-lua

use thiserror::Error;

/// Errors that can occur while bridging Lua and the provider engine
#[derive(Debug, Error)]
pub enum Error {
    #[error("Lua runtime error: {0}")]
    Runtime(#[from] mlua::Error),

    #[error("Provider error: {0}")]
    Provider(#[from] rig_provider::ProviderError),

    #[error("Value error: {0}")]
    Value(#[from] rig_provider::ValueError),
}

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, Error>;
