//! rig-provider: the provider record engine for rig.lua
//!
//! Build rules exchange metadata as *provider* records: typed, extensible
//! objects validated against a declared field schema. This crate owns:
//! - Provider schemas: sorted field lists, identity, the one-time export flag
//! - Records: construction from keyword arguments, lookup, disjoint merge
//! - The value model records carry, with its freeze/immutability contract

mod error;
mod record;
mod schema;
mod value;

pub use error::ProviderError;
pub use record::{Location, Record};
pub use schema::{Provider, ProviderId};
pub use value::{Callable, Dict, List, Value, ValueError};

/// Result type for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;
