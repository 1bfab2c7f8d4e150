use chrono::format::{
  Item,
  StrftimeItems,
};
use mlua::{
  Error as LuaError,
  Lua,
  Table,
  Value,
};
use std::{
  cell::RefCell,
  io,
  rc::Rc,
  time::Duration,
};

use super::Config;
use crate::sandbox::EnvPolicy;

/// Install the `studio` table seen by `init.lua`.
///
/// `studio.config(tbl)` merges the `runner` and `ui` blocks into `config_acc`;
/// `studio.trace(text)` writes to the trace log. Calling anything else on
/// `studio` raises.
pub(crate) fn install_studio_api(
  lua: &Lua,
  config_acc: Rc<RefCell<Config>>,
) -> io::Result<()>
{
  let globals = lua.globals();
  let studio: Table =
    lua.create_table().map_err(|e| io::Error::other(e.to_string()))?;

  let config_fn = lua
    .create_function(move |_, tbl: Value| {
      let Value::Table(t) = tbl
      else
      {
        return Err(LuaError::RuntimeError(String::from(
          "studio.config expects a table",
        )));
      };
      let mut cfg = config_acc
        .try_borrow_mut()
        .map_err(|e| LuaError::RuntimeError(e.to_string()))?;
      if let Ok(v) = t.get::<u32>("config_version")
      {
        cfg.config_version = v;
      }
      if let Ok(runner_tbl) = t.get::<Table>("runner")
      {
        merge_runner_table(&runner_tbl, &mut cfg)?;
      }
      if let Ok(ui_tbl) = t.get::<Table>("ui")
      {
        merge_ui_table(&ui_tbl, &mut cfg);
      }
      Ok(true)
    })
    .map_err(|e| io::Error::other(e.to_string()))?;
  studio.set("config", config_fn).map_err(|e| io::Error::other(e.to_string()))?;

  let trace_fn = lua
    .create_function(|_, text: String| {
      crate::trace::log(text);
      Ok(true)
    })
    .map_err(|e| io::Error::other(e.to_string()))?;
  studio.set("trace", trace_fn).map_err(|e| io::Error::other(e.to_string()))?;

  // Unknown function guard at config time
  let mt = lua.create_table().map_err(|e| io::Error::other(e.to_string()))?;
  let idx = lua
    .create_function(move |lua, (_tbl, key): (Table, Value)| {
      let name = match key
      {
        Value::String(s) => s
          .to_str()
          .map(|v| v.to_string())
          .unwrap_or_else(|_| String::from("?")),
        other => format!("{:?}", other),
      };
      let func = lua.create_function(move |_, ()| -> mlua::Result<()> {
        Err(LuaError::RuntimeError(format!(
          "unknown studio function: {}",
          name
        )))
      })?;
      Ok(func)
    })
    .map_err(|e| io::Error::other(e.to_string()))?;
  mt.set("__index", idx).map_err(|e| io::Error::other(e.to_string()))?;
  let _ = studio.set_metatable(Some(mt));
  globals.set("studio", studio).map_err(|e| io::Error::other(e.to_string()))?;
  Ok(())
}

fn merge_runner_table(
  tbl: &Table,
  cfg: &mut Config,
) -> Result<(), LuaError>
{
  let runner = &mut cfg.runner;
  if let Ok(ms) = tbl.get::<u64>("timeout_ms")
  {
    if ms == 0
    {
      return Err(LuaError::RuntimeError(String::from(
        "runner.timeout_ms must be positive",
      )));
    }
    runner.timeout = Duration::from_millis(ms);
  }
  if let Ok(n) = tbl.get::<u32>("hook_interval")
  {
    runner.hook_interval = n.max(1);
  }
  if let Ok(n) = tbl.get::<usize>("output_capacity")
  {
    runner.output_capacity = n.max(1);
  }
  if let Ok(s) = tbl.get::<String>("env_policy")
  {
    runner.env_policy = EnvPolicy::from_str_opt(&s).ok_or_else(|| {
      LuaError::RuntimeError(format!(
        "runner.env_policy must be \"recreate\" or \"reuse\", got \"{s}\""
      ))
    })?;
  }
  if let Ok(mb) = tbl.get::<usize>("memory_limit_mb")
  {
    // 0 lifts the cap entirely.
    runner.memory_limit = (mb > 0).then(|| mb.saturating_mul(1024 * 1024));
  }
  Ok(())
}

fn merge_ui_table(
  tbl: &Table,
  cfg: &mut Config,
)
{
  if let Ok(w) = tbl.get::<u16>("explorer_width")
  {
    cfg.ui.explorer_width = w.clamp(12, 80);
  }
  if let Ok(h) = tbl.get::<u16>("terminal_height")
  {
    cfg.ui.terminal_height = h.clamp(3, 60);
  }
  if let Ok(s) = tbl.get::<String>("date_format")
    && !s.trim().is_empty()
    && !StrftimeItems::new(&s).any(|i| matches!(i, Item::Error))
  {
    cfg.ui.date_format = s;
  }
}
