//! Lua runtime for rig build-description chunks
//!
//! Owns a Lua state with the rig globals registered and the bridge-side
//! callable registry. The broader evaluator (file loading, module
//! resolution, rule execution) lives elsewhere; this runtime only knows
//! how to run a chunk against the provider globals.

use std::cell::RefCell;
use std::rc::Rc;

use mlua::Lua;
use tracing::debug;

use crate::convert::Callables;
use crate::error::Result;
use crate::globals;

/// The Lua runtime environment with the rig globals registered
pub struct Runtime {
    lua: Lua,
    callables: Rc<RefCell<Callables>>,
}

impl Runtime {
    /// Create a new Lua runtime with all globals registered
    pub fn new() -> Result<Self> {
        let lua = Lua::new();
        let callables = Rc::new(RefCell::new(Callables::new()));
        globals::register_globals(&lua, Rc::clone(&callables))?;

        Ok(Self { lua, callables })
    }

    /// Run a build-description chunk
    pub fn exec(&self, source: &str, chunk_name: &str) -> Result<()> {
        debug!("Evaluating chunk '{}'", chunk_name);
        self.lua.load(source).set_name(chunk_name).exec()?;
        Ok(())
    }

    /// Get access to the raw Lua state (for advanced use cases)
    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    /// Get access to the callable registry (for testing or introspection)
    pub fn callables(&self) -> Rc<RefCell<Callables>> {
        Rc::clone(&self.callables)
    }
}
