//! Global Lua functions and the rig table
//!
//! Build scripts see:
//! - `provider { name = "RigInfo", fields = { "srcs", "deps" } }` declares
//!   a provider; the returned value is callable and instantiates records
//! - `export(P)` completes the provider's one-time export transition
//! - the `rig` table with version info and `rig.lib.to_json`

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use mlua::prelude::*;
use rig_provider::{Provider, Record, Value};
use tracing::debug;

use crate::convert::{lua_to_value, value_to_lua, Callables};

/// A declared provider, as seen by Lua
pub struct ProviderValue {
    provider: Arc<Provider>,
    callables: Rc<RefCell<Callables>>,
}

impl ProviderValue {
    pub fn new(provider: Arc<Provider>, callables: Rc<RefCell<Callables>>) -> Self {
        Self {
            provider,
            callables,
        }
    }

    pub fn provider(&self) -> &Arc<Provider> {
        &self.provider
    }
}

impl LuaUserData for ProviderValue {
    fn add_fields<F: LuaUserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("name", |_, this| Ok(this.provider.name().to_string()));
        fields.add_field_method_get("exported", |_, this| Ok(this.provider.is_exported()));
        fields.add_field_method_get("fields", |_, this| Ok(this.provider.fields().to_vec()));
    }

    fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
        // Calling the provider instantiates a record: P { srcs = ..., deps = ... }
        methods.add_meta_method(LuaMetaMethod::Call, |lua, this, kwargs: Option<LuaTable>| {
            let mut args: Vec<(String, Value)> = Vec::new();

            if let Some(kwargs) = kwargs {
                for pair in kwargs.pairs::<LuaValue, LuaValue>() {
                    let (key, value) = pair?;
                    let name = match key {
                        LuaValue::String(s) => s.to_str()?.to_string(),
                        other => {
                            return Err(LuaError::runtime(format!(
                                "provider fields must be passed as named arguments, got {} key",
                                other.type_name()
                            )));
                        }
                    };
                    args.push((name, lua_to_value(lua, value, &this.callables)?));
                }
            }

            // TODO: capture the calling chunk and line via debug info so
            // records carry a real origin instead of none
            let record = Record::from_named_args(Arc::clone(&this.provider), args, None)
                .map_err(LuaError::external)?;

            Ok(RecordValue::new(Arc::new(record), this.callables.clone()))
        });
    }
}

/// A provider record, as seen by Lua
pub struct RecordValue {
    record: Arc<Record>,
    callables: Rc<RefCell<Callables>>,
}

impl RecordValue {
    pub fn new(record: Arc<Record>, callables: Rc<RefCell<Callables>>) -> Self {
        Self { record, callables }
    }

    pub fn record(&self) -> &Arc<Record> {
        &self.record
    }
}

impl LuaUserData for RecordValue {
    fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
        // Names of the set fields, in schema order
        methods.add_method("fields", |_, this, ()| {
            let names: Vec<String> = this
                .record
                .field_names()
                .into_iter()
                .map(String::from)
                .collect();
            Ok(names)
        });

        methods.add_method("is_immutable", |_, this, ()| Ok(this.record.is_immutable()));

        methods.add_method("provider", |_, this, ()| {
            Ok(ProviderValue::new(
                Arc::clone(this.record.provider()),
                this.callables.clone(),
            ))
        });

        // Field access: r.srcs is nil when unset, an error never
        methods.add_meta_method(LuaMetaMethod::Index, |lua, this, key: String| {
            match this.record.get(&key) {
                Some(value) => value_to_lua(lua, value, &this.callables),
                None => Ok(LuaValue::Nil),
            }
        });

        // Disjoint-union merge of two records of the same provider
        methods.add_meta_method(LuaMetaMethod::Add, |_, this, other: LuaAnyUserData| {
            let other = other
                .borrow::<RecordValue>()
                .map_err(|_| LuaError::runtime("'+' operand is not a provider record"))?;
            let merged = this
                .record
                .merge(&other.record)
                .map_err(LuaError::external)?;
            Ok(RecordValue::new(Arc::new(merged), this.callables.clone()))
        });

        methods.add_meta_method(LuaMetaMethod::Eq, |_, this, other: LuaAnyUserData| {
            Ok(other
                .borrow::<RecordValue>()
                .map(|other| this.record == other.record)
                .unwrap_or(false))
        });
    }
}

/// Register the rig globals on a fresh Lua state
pub fn register_globals(lua: &Lua, callables: Rc<RefCell<Callables>>) -> LuaResult<()> {
    register_provider_function(lua, callables.clone())?;
    register_export_function(lua)?;
    register_rig_table(lua, callables)?;

    debug!("Registered rig globals");
    Ok(())
}

/// Set up the provider{} global function
fn register_provider_function(lua: &Lua, callables: Rc<RefCell<Callables>>) -> LuaResult<()> {
    let provider_fn = lua.create_function(move |_, spec: LuaTable| {
        let name: String = spec
            .get("name")
            .map_err(|_| LuaError::runtime("provider{} requires a 'name' field"))?;

        let fields_table: LuaTable = spec
            .get("fields")
            .map_err(|_| LuaError::runtime("provider{} requires a 'fields' list"))?;

        let mut fields = Vec::new();
        for field in fields_table.sequence_values::<String>() {
            fields.push(field?);
        }

        let provider = Provider::new(name, fields).map_err(LuaError::external)?;
        debug!("declared provider '{}'", provider.name());

        Ok(ProviderValue::new(Arc::new(provider), callables.clone()))
    })?;

    lua.globals().set("provider", provider_fn)?;
    Ok(())
}

/// Set up the export() global function
///
/// The engine treats a second export as a programming error and panics;
/// from a build script it is an ordinary runtime error, so the guard here
/// checks first. The Lua state is single-threaded, so check-then-mark
/// cannot race.
fn register_export_function(lua: &Lua) -> LuaResult<()> {
    let export_fn = lua.create_function(|_, ud: LuaAnyUserData| {
        let value = ud
            .borrow::<ProviderValue>()
            .map_err(|_| LuaError::runtime("export() expects a provider"))?;

        if value.provider.is_exported() {
            return Err(LuaError::runtime(format!(
                "provider '{}' already exported",
                value.provider.name()
            )));
        }
        value.provider.mark_exported();
        Ok(())
    })?;

    lua.globals().set("export", export_fn)?;
    Ok(())
}

/// Set up the rig global table
fn register_rig_table(lua: &Lua, callables: Rc<RefCell<Callables>>) -> LuaResult<()> {
    let rig = lua.create_table()?;
    rig.set("version", env!("CARGO_PKG_VERSION"))?;

    let lib = lua.create_table()?;
    let to_json = lua.create_function(move |lua, value: LuaValue| {
        let value = lua_to_value(lua, value, &callables)?;
        let json = value.to_json().map_err(LuaError::external)?;
        serde_json::to_string(&json).map_err(LuaError::external)
    })?;
    lib.set("to_json", to_json)?;
    rig.set("lib", lib)?;

    lua.globals().set("rig", rig)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_lua() -> Lua {
        let lua = Lua::new();
        let callables = Rc::new(RefCell::new(Callables::new()));
        register_globals(&lua, callables).unwrap();
        lua
    }

    #[test]
    fn test_provider_requires_name_and_fields() {
        let lua = test_lua();
        assert!(lua.load("provider { fields = { 'a' } }").exec().is_err());
        assert!(lua.load("provider { name = 'RigInfo' }").exec().is_err());
        assert!(lua
            .load("provider { name = 'RigInfo', fields = { 'a' } }")
            .exec()
            .is_ok());
    }

    #[test]
    fn test_provider_value_fields() {
        let lua = test_lua();
        let ok: bool = lua
            .load(
                r#"
                local P = provider { name = 'RigInfo', fields = { 'srcs', 'deps' } }
                return P.name == 'RigInfo'
                    and #P.fields == 2
                    and P.fields[1] == 'deps'  -- sorted
                    and not P.exported
            "#,
            )
            .eval()
            .unwrap();
        assert!(ok);
    }

    #[test]
    fn test_duplicate_schema_field_rejected() {
        let lua = test_lua();
        let result = lua
            .load("provider { name = 'RigInfo', fields = { 'a', 'a' } }")
            .exec();
        assert!(result.is_err());
    }

    #[test]
    fn test_export_from_lua() {
        let lua = test_lua();
        let ok: bool = lua
            .load(
                r#"
                local P = provider { name = 'RigInfo', fields = { 'srcs' } }
                export(P)
                return P.exported
            "#,
            )
            .eval()
            .unwrap();
        assert!(ok);
    }

    #[test]
    fn test_double_export_is_script_error() {
        let lua = test_lua();
        let msg: String = lua
            .load(
                r#"
                local P = provider { name = 'RigInfo', fields = { 'srcs' } }
                export(P)
                local ok, err = pcall(export, P)
                assert(not ok)
                return tostring(err)
            "#,
            )
            .eval()
            .unwrap();
        assert!(msg.contains("provider 'RigInfo' already exported"));
    }

    #[test]
    fn test_export_rejects_non_provider() {
        let lua = test_lua();
        let ok: bool = lua.load("return pcall(export, 42)").eval().unwrap();
        assert!(!ok);
    }

    #[test]
    fn test_to_json() {
        let lua = test_lua();
        let json: String = lua
            .load(r#"return rig.lib.to_json({ name = 'test', count = 42 })"#)
            .eval()
            .unwrap();
        assert_eq!(json, r#"{"count":42,"name":"test"}"#);
    }
}
