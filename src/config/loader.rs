use std::{
  cell::RefCell,
  fs,
  io,
  rc::Rc,
};

use super::{
  Config,
  ConfigEngine,
  ConfigPaths,
};

/// Evaluate the user's `init.lua` (if any) on top of the defaults.
pub fn load_config(paths: &ConfigPaths) -> io::Result<Config>
{
  if !paths.exists
  {
    crate::trace::log("[config] no init.lua, using defaults");
    return Ok(Config::default());
  }
  let code = fs::read_to_string(&paths.entry)
    .map_err(|e| io_err(format!("read init.lua failed: {e}")))?;
  crate::trace::log(format!(
    "[config] exec user config: {}",
    paths.entry.to_string_lossy()
  ));
  eval_config(&code, &paths.entry.to_string_lossy())
}

/// Same as [`load_config`] for configuration held in memory.
pub fn load_config_from_code(code: &str) -> io::Result<Config>
{
  crate::trace::log("[config] exec inline init.lua");
  eval_config(code, "inline init.lua")
}

fn eval_config(
  code: &str,
  name: &str,
) -> io::Result<Config>
{
  let engine =
    ConfigEngine::new().map_err(|e| io_err(format!("lua init failed: {e}")))?;
  let lua = engine.lua();
  let config_acc = Rc::new(RefCell::new(Config::default()));
  super::install_studio_api(lua, Rc::clone(&config_acc))
    .map_err(|e| io_err(format!("studio api install failed: {e}")))?;

  if let Err(e) = lua.load(code).set_name(format!("={name}")).exec()
  {
    crate::trace::log(format!("[config] {name} error: {e}"));
    return Err(io_err(format!("{name} execution failed: {e}")));
  }
  let cfg = config_acc.borrow().clone();
  Ok(cfg)
}

fn io_err(msg: String) -> io::Error
{
  io::Error::other(msg)
}
