use std::{
  cell::RefCell,
  collections::HashMap,
  rc::Rc,
};

use mlua::{
  Error as LuaError,
  Lua,
  Table,
  Value,
};

/// Project modules the host makes available to `require`, keyed by module
/// name (`utils`, `lib.strings`).
pub type ModuleMap = HashMap<String, String>;

const LOADED_KEY: &str = "luastudio.loaded";

/// Stdlib tables that `require` hands back directly; they are already loaded
/// into the state.
const BUILTIN_MODULES: &[&str] = &["math", "string", "table", "utf8", "coroutine"];

/// Install a `require` that only resolves builtin libraries and in-memory
/// project modules. Loaded modules are cached per state until
/// [`reset_loaded`] is called.
pub(crate) fn install_require(
  lua: &Lua,
  modules: Rc<RefCell<ModuleMap>>,
) -> mlua::Result<()>
{
  reset_loaded(lua)?;
  let require_fn = lua.create_function(move |lua, name: String| {
    if name.is_empty() || name.contains("..") || name.starts_with('/')
    {
      return Err(LuaError::external("invalid module name"));
    }
    let loaded: Table = lua.named_registry_value(LOADED_KEY)?;
    if let Ok(v) = loaded.get::<Value>(name.as_str())
      && !v.is_nil()
    {
      return Ok(v);
    }
    if BUILTIN_MODULES.contains(&name.as_str())
    {
      return lua.globals().get::<Value>(name.as_str());
    }
    let code = modules
      .borrow()
      .get(&name)
      .cloned()
      .ok_or_else(|| LuaError::external(format!("module '{name}' not found")))?;
    crate::trace::log(format!("[lua] require {name}"));
    let chunk_name = format!("={}.lua", name.replace('.', "/"));
    let value = lua.load(&code).set_name(chunk_name).eval::<Value>()?;
    let stored = if value.is_nil() { Value::Boolean(true) } else { value };
    loaded.set(name.as_str(), stored.clone())?;
    Ok(stored)
  })?;
  lua.globals().set("require", require_fn)?;
  Ok(())
}

/// Forget every module `require` has cached.
pub(crate) fn reset_loaded(lua: &Lua) -> mlua::Result<()>
{
  lua.set_named_registry_value(LOADED_KEY, lua.create_table()?)
}

#[cfg(test)]
mod tests
{
  use super::*;

  fn lua_with_modules(mods: &[(&str, &str)]) -> Lua
  {
    let lua = Lua::new();
    let map: ModuleMap =
      mods.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    install_require(&lua, Rc::new(RefCell::new(map))).unwrap();
    lua
  }

  #[test]
  fn builtin_libraries_resolve_to_globals()
  {
    let lua = lua_with_modules(&[]);
    let same: bool =
      lua.load(r#"return require("math") == math"#).eval().unwrap();
    assert!(same);
  }

  #[test]
  fn project_modules_are_loaded_once()
  {
    let lua = lua_with_modules(&[(
      "utils",
      "count = (count or 0) + 1 return { twice = function(x) return x * 2 end }",
    )]);
    let (v, count): (i64, i64) = lua
      .load(r#"local a = require("utils") local b = require("utils") return a.twice(21), count"#)
      .eval()
      .unwrap();
    assert_eq!(v, 42);
    assert_eq!(count, 1);
  }

  #[test]
  fn traversal_and_unknown_modules_are_rejected()
  {
    let lua = lua_with_modules(&[]);
    let err = lua.load(r#"require("../etc/passwd")"#).exec().unwrap_err();
    assert!(err.to_string().contains("invalid module name"));
    let err = lua.load(r#"require("nope")"#).exec().unwrap_err();
    assert!(err.to_string().contains("module 'nope' not found"));
  }
}
