//! Conversion between Lua values and engine values
//!
//! Scalars map directly. Tables become lists when every key is an integer
//! (and the table is non-empty), dicts when every key is a string; anything
//! else is rejected rather than coerced. Functions are parked in the Lua
//! registry and carried through the engine as opaque callable handles.
//! Conversion copies containers at the boundary; sharing between records is
//! an engine-side property.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use mlua::prelude::*;
use mlua::RegistryKey;
use rig_provider::{Callable, Dict, List, Value};

use crate::globals::RecordValue;

/// Bridge-side registry mapping engine callable tokens to Lua functions
pub struct Callables {
    next_token: u64,
    functions: HashMap<u64, RegistryKey>,
}

impl Callables {
    pub fn new() -> Self {
        Self {
            next_token: 1,
            functions: HashMap::new(),
        }
    }

    /// Park a Lua function in the registry and hand out an engine handle
    pub fn register(&mut self, lua: &Lua, func: LuaFunction) -> LuaResult<Callable> {
        let key = lua.create_registry_value(func)?;
        let token = self.next_token;
        self.next_token += 1;
        self.functions.insert(token, key);
        Ok(Callable::new(token, "<function>"))
    }

    /// Resolve an engine handle back to the parked Lua function
    pub fn resolve(&self, lua: &Lua, token: u64) -> LuaResult<LuaFunction> {
        let key = self.functions.get(&token).ok_or_else(|| {
            LuaError::runtime(format!("unknown function handle #{}", token))
        })?;
        lua.registry_value(key)
    }
}

impl Default for Callables {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a Lua value into an engine value
pub fn lua_to_value(
    lua: &Lua,
    value: LuaValue,
    callables: &Rc<RefCell<Callables>>,
) -> LuaResult<Value> {
    match value {
        LuaValue::Boolean(b) => Ok(Value::Bool(b)),
        LuaValue::Integer(i) => Ok(Value::Int(i)),
        LuaValue::Number(n) => Ok(Value::Float(n)),
        LuaValue::String(s) => Ok(Value::from(s.to_str()?.to_string())),
        LuaValue::Table(t) => table_to_value(lua, t, callables),
        LuaValue::Function(f) => {
            let callable = callables.borrow_mut().register(lua, f)?;
            Ok(Value::Callable(Arc::new(callable)))
        }
        LuaValue::UserData(ud) => {
            if let Ok(record) = ud.borrow::<RecordValue>() {
                return Ok(Value::Record(Arc::clone(record.record())));
            }
            Err(LuaError::runtime(
                "cannot use this userdata as a provider field value",
            ))
        }
        other => Err(LuaError::runtime(format!(
            "cannot use a {} as a provider field value",
            other.type_name()
        ))),
    }
}

/// A non-empty table with only integer keys is a list; a table with only
/// string keys (or no keys at all) is a dict.
fn table_to_value(
    lua: &Lua,
    table: LuaTable,
    callables: &Rc<RefCell<Callables>>,
) -> LuaResult<Value> {
    let is_sequence = !table.is_empty()
        && table
            .clone()
            .pairs::<i64, LuaValue>()
            .all(|pair| pair.is_ok());

    if is_sequence {
        let mut items = Vec::new();
        for item in table.sequence_values::<LuaValue>() {
            items.push(lua_to_value(lua, item?, callables)?);
        }
        return Ok(Value::List(Arc::new(List::from_vec(items))));
    }

    let dict = Dict::new();
    for pair in table.pairs::<LuaValue, LuaValue>() {
        let (key, value) = pair?;
        let key = match key {
            LuaValue::String(s) => s.to_str()?.to_string(),
            other => {
                return Err(LuaError::runtime(format!(
                    "table keys must be all integers (a list) or all strings (a dict), got {}",
                    other.type_name()
                )));
            }
        };
        let value = lua_to_value(lua, value, callables)?;
        dict.insert(key, value)
            .map_err(LuaError::external)?;
    }
    Ok(Value::Dict(Arc::new(dict)))
}

/// Convert an engine value back into a Lua value
pub fn value_to_lua(
    lua: &Lua,
    value: &Value,
    callables: &Rc<RefCell<Callables>>,
) -> LuaResult<LuaValue> {
    Ok(match value {
        Value::Bool(b) => LuaValue::Boolean(*b),
        Value::Int(i) => LuaValue::Integer(*i),
        Value::Float(f) => LuaValue::Number(*f),
        Value::Str(s) => LuaValue::String(lua.create_string(s.as_ref())?),
        Value::List(list) => {
            let table = lua.create_table()?;
            for (i, item) in list.to_vec().iter().enumerate() {
                table.set(i + 1, value_to_lua(lua, item, callables)?)?;
            }
            LuaValue::Table(table)
        }
        Value::Dict(dict) => {
            let table = lua.create_table()?;
            for (key, item) in dict.to_map().iter() {
                table.set(key.as_str(), value_to_lua(lua, item, callables)?)?;
            }
            LuaValue::Table(table)
        }
        Value::Record(record) => {
            let wrapped = RecordValue::new(Arc::clone(record), callables.clone());
            LuaValue::UserData(lua.create_userdata(wrapped)?)
        }
        Value::Callable(callable) => {
            let func = callables.borrow().resolve(lua, callable.token())?;
            LuaValue::Function(func)
        }
    })
}
