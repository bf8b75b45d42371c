//! rig-lua: Lua bridge for the rig provider engine
//!
//! This crate exposes providers and records to build scripts:
//! - `provider { name = ..., fields = {...} }` declares a provider
//! - calling the provider value instantiates a validated record
//! - `export(P)` completes the one-time export transition
//! - records support field access, the `+` merge operator, and equality
//! - the `rig` table carries version info and `rig.lib.to_json`

mod convert;
mod error;
mod globals;
mod runtime;

pub use convert::{lua_to_value, value_to_lua, Callables};
pub use error::{Error, Result};
pub use globals::{register_globals, ProviderValue, RecordValue};
pub use runtime::Runtime;
