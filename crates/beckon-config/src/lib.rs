use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use beckon_core::BrokerConfig;
use mlua::{Lua, LuaSerdeExt, Table, Value};
use serde::de::DeserializeOwned;

/// Loads a config from a Lua file that returns a table, falling back to the default
/// when the file is missing or does not evaluate to a valid config.
pub fn load_config<ConfigType: DeserializeOwned + Default>(path: &Path) -> ConfigType {
    if !path.exists() {
        return ConfigType::default();
    }

    try_load_config(path).unwrap_or_else(|e| {
        log::warn!("Failed to load {}: {:#}", path.display(), e);
        ConfigType::default()
    })
}

pub fn try_load_config<ConfigType: DeserializeOwned>(path: &Path) -> Result<ConfigType> {
    let lua = Lua::new();
    let table = eval_lua_file(path, &lua)?;
    lua.from_value::<ConfigType>(Value::Table(table))
        .with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn load_broker_config(path: &Path) -> BrokerConfig {
    load_config(path)
}

fn eval_lua_file(path: &Path, lua: &Lua) -> Result<Table> {
    let src = fs::read_to_string(path)
        .with_context(|| format!("Failed reading {}", path.display()))?;
    let value = lua
        .load(&src)
        .set_name(path.to_string_lossy())
        .eval::<Value>()?;

    match value {
        Value::Table(table) => Ok(table),
        _ => Err(anyhow::anyhow!(
            "Lua file did not return a table: {}",
            path.display()
        )),
    }
}
