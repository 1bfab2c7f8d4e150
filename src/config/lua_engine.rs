use mlua::{
  Lua,
  LuaOptions,
  Result as LuaResult,
  StdLib,
};

/// ConfigEngine creates the Lua runtime that evaluates `init.lua`.
/// Safety model:
/// - Load only BASE | STRING | TABLE | MATH stdlibs (no io/os/debug/package).
/// - The `studio` table is installed by the loader.
pub struct ConfigEngine
{
  lua: Lua,
}

impl ConfigEngine
{
  /// Initialize a new sandboxed Lua state.
  pub fn new() -> LuaResult<Self>
  {
    let lua = Lua::new_with(
      StdLib::STRING | StdLib::TABLE | StdLib::MATH,
      LuaOptions::default(),
    )?;
    Ok(Self { lua })
  }

  pub fn lua(&self) -> &Lua
  {
    &self.lua
  }
}
