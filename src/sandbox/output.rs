//! Interception of the script-visible `print` primitive.

use std::rc::Rc;

use mlua::{
  Error as LuaError,
  Function,
  Lua,
  MultiValue,
  RegistryKey,
  Value,
};

use super::message::OutputMessage;

/// Consumer of intercepted output. Returns `false` once the consumer is gone,
/// which aborts the script at its next `print`.
pub type OutputSink = Rc<dyn Fn(OutputMessage) -> bool>;

/// Replaces the global `print` for the duration of one run and puts the
/// previous value back afterwards.
#[derive(Default)]
pub struct OutputChannel
{
  previous: Option<RegistryKey>,
}

impl OutputChannel
{
  pub fn new() -> Self
  {
    Self::default()
  }

  pub fn is_installed(&self) -> bool
  {
    self.previous.is_some()
  }

  /// Route every `print` call to `sink`. A second call while installed is a
  /// no-op so output is never duplicated.
  pub fn install(
    &mut self,
    lua: &Lua,
    sink: OutputSink,
  ) -> mlua::Result<()>
  {
    if self.previous.is_some()
    {
      return Ok(());
    }
    let globals = lua.globals();
    let prev: Value = globals.get("print")?;
    let tostring: Function = globals.get("tostring")?;
    let print_fn = lua.create_function(move |_, args: MultiValue| {
      let text = render_print_args(&tostring, args)?;
      if sink(OutputMessage::info(text))
      {
        Ok(())
      }
      else
      {
        Err(LuaError::external("output consumer closed"))
      }
    })?;
    let key = lua.create_registry_value(prev)?;
    globals.set("print", print_fn)?;
    self.previous = Some(key);
    Ok(())
  }

  /// Restore whatever `print` was before [`install`](Self::install).
  pub fn uninstall(
    &mut self,
    lua: &Lua,
  ) -> mlua::Result<()>
  {
    let Some(key) = self.previous.take()
    else
    {
      return Ok(());
    };
    let prev: Value = lua.registry_value(&key)?;
    lua.globals().set("print", prev)?;
    lua.remove_registry_value(key)?;
    Ok(())
  }
}

// Same shape as Lua's own print: tostring on every argument, tab separated.
fn render_print_args(
  tostring: &Function,
  args: MultiValue,
) -> mlua::Result<String>
{
  let mut parts: Vec<String> = Vec::with_capacity(args.len());
  for v in args
  {
    let s: mlua::String = tostring.call(v)?;
    parts.push(s.to_string_lossy().to_string());
  }
  Ok(parts.join("\t"))
}

#[cfg(test)]
mod tests
{
  use std::cell::RefCell;

  use super::*;
  use crate::sandbox::message::MessageKind;

  fn collecting_sink() -> (OutputSink, Rc<RefCell<Vec<OutputMessage>>>)
  {
    let seen: Rc<RefCell<Vec<OutputMessage>>> = Rc::new(RefCell::new(Vec::new()));
    let seen_in = Rc::clone(&seen);
    let sink: OutputSink = Rc::new(move |m: OutputMessage| {
      seen_in.borrow_mut().push(m);
      true
    });
    (sink, seen)
  }

  #[test]
  fn print_is_forwarded_with_lua_formatting()
  {
    let lua = Lua::new();
    let (sink, seen) = collecting_sink();
    let mut ch = OutputChannel::new();
    ch.install(&lua, sink).unwrap();
    lua.load(r#"print("a", 1, nil, true) print() print("x" .. 2)"#).exec().unwrap();
    let seen = seen.borrow();
    let texts: Vec<&str> = seen.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["a\t1\tnil\ttrue", "", "x2"]);
    assert!(seen.iter().all(|m| m.kind == MessageKind::Info));
  }

  #[test]
  fn install_twice_does_not_duplicate_output()
  {
    let lua = Lua::new();
    let (sink, seen) = collecting_sink();
    let mut ch = OutputChannel::new();
    ch.install(&lua, Rc::clone(&sink)).unwrap();
    ch.install(&lua, sink).unwrap();
    lua.load(r#"print("once")"#).exec().unwrap();
    assert_eq!(seen.borrow().len(), 1);
  }

  #[test]
  fn uninstall_restores_previous_print()
  {
    let lua = Lua::new();
    lua
      .load(r#"captured = {} print = function(s) table.insert(captured, s) end"#)
      .exec()
      .unwrap();
    let (sink, seen) = collecting_sink();
    let mut ch = OutputChannel::new();
    ch.install(&lua, sink).unwrap();
    lua.load(r#"print("hooked")"#).exec().unwrap();
    ch.uninstall(&lua).unwrap();
    assert!(!ch.is_installed());
    lua.load(r#"print("plain")"#).exec().unwrap();
    assert_eq!(seen.borrow().len(), 1);
    let n: i64 = lua.load("return #captured").eval().unwrap();
    assert_eq!(n, 1);
  }

  #[test]
  fn closed_consumer_raises_inside_the_script()
  {
    let lua = Lua::new();
    let sink: OutputSink = Rc::new(|_: OutputMessage| false);
    let mut ch = OutputChannel::new();
    ch.install(&lua, sink).unwrap();
    let err = lua.load(r#"print("lost")"#).exec().unwrap_err();
    assert!(err.to_string().contains("output consumer closed"));
  }
}
