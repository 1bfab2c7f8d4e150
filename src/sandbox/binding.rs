//! Thin adapter over the embedded Lua engine.
//!
//! Safety model:
//! - Load only BASE | STRING | TABLE | MATH | UTF8 | COROUTINE (no io, os,
//!   debug or package).
//! - A restricted `require()` resolves builtin tables and in-memory project
//!   modules only.
//! - Optional allocator cap, and a global instruction/call hook (inherited
//!   by coroutines) that enforces the run deadline and host cancellation.

use std::{
  cell::{
    Cell,
    RefCell,
  },
  fmt,
  rc::Rc,
  time::Instant,
};

use mlua::{
  Error as LuaError,
  Function,
  HookTriggers,
  Lua,
  LuaOptions,
  StdLib,
  VmState,
};

use super::{
  CancelToken,
  error::SandboxError,
  require::{
    ModuleMap,
    install_require,
    reset_loaded,
  },
};

/// Knobs applied when a fresh engine is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineLimits
{
  /// Allocator cap in bytes; `None` leaves the state unbounded.
  pub memory_limit:  Option<usize>,
  /// Instructions between deadline/cancel checks.
  pub hook_interval: u32,
}

impl Default for EngineLimits
{
  fn default() -> Self
  {
    Self { memory_limit: Some(64 * 1024 * 1024), hook_interval: 1000 }
  }
}

/// A compiled chunk, ready for [`LuaEngine::execute`].
pub struct Program
{
  func: Function,
  name: String,
}

impl Program
{
  pub fn name(&self) -> &str
  {
    &self.name
  }
}

/// Why the instruction hook stopped a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt
{
  Timeout,
  Cancelled,
}

impl fmt::Display for Interrupt
{
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result
  {
    match self
    {
      Interrupt::Timeout => f.write_str("script deadline exceeded"),
      Interrupt::Cancelled => f.write_str("script cancelled"),
    }
  }
}

/// Deadline and cancellation state for one run, shared by the interpreter
/// hook and anything that blocks on behalf of the script.
///
/// The first reason to trip sticks even if the script swallows the raised
/// error with `pcall`.
#[derive(Debug, Clone, Default)]
pub struct Watchdog
{
  cancel:   CancelToken,
  deadline: Rc<Cell<Option<Instant>>>,
  tripped:  Rc<Cell<Option<Interrupt>>>,
}

impl Watchdog
{
  pub fn new(cancel: CancelToken) -> Self
  {
    Self { cancel, ..Self::default() }
  }

  /// Start the clock. Before this only cancellation can trip.
  pub fn arm(
    &self,
    deadline: Instant,
  )
  {
    self.deadline.set(Some(deadline));
  }

  /// Test cancellation and the deadline, latching the first reason seen.
  pub fn check(&self) -> Option<Interrupt>
  {
    if let Some(reason) = self.tripped.get()
    {
      return Some(reason);
    }
    let hit = if self.cancel.is_cancelled()
    {
      Some(Interrupt::Cancelled)
    }
    else if self.deadline.get().is_some_and(|d| Instant::now() >= d)
    {
      Some(Interrupt::Timeout)
    }
    else
    {
      None
    };
    if hit.is_some()
    {
      self.tripped.set(hit);
    }
    hit
  }

  pub fn tripped(&self) -> Option<Interrupt>
  {
    self.tripped.get()
  }
}

/// One interpreter environment: a Lua state plus the host-side module table.
pub struct LuaEngine
{
  lua:     Lua,
  modules: Rc<RefCell<ModuleMap>>,
  armed:   Rc<RefCell<Option<Watchdog>>>,
  limits:  EngineLimits,
}

impl LuaEngine
{
  /// Initialize a new sandboxed Lua state.
  pub fn new(limits: EngineLimits) -> Result<Self, SandboxError>
  {
    let lua = Lua::new_with(
      StdLib::STRING
        | StdLib::TABLE
        | StdLib::MATH
        | StdLib::UTF8
        | StdLib::COROUTINE,
      LuaOptions::default(),
    )
    .map_err(|e| SandboxError::InternalFault(format!("lua init failed: {e}")))?;
    if let Some(limit) = limits.memory_limit
    {
      lua.set_memory_limit(limit).map_err(|e| {
        SandboxError::InternalFault(format!("memory limit failed: {e}"))
      })?;
    }
    let armed = Rc::new(RefCell::new(None));
    install_hook(&lua, limits.hook_interval, Rc::clone(&armed)).map_err(|e| {
      SandboxError::InternalFault(format!("interrupt hook install failed: {e}"))
    })?;
    let modules = Rc::new(RefCell::new(ModuleMap::new()));
    install_require(&lua, Rc::clone(&modules)).map_err(|e| {
      SandboxError::InternalFault(format!("require install failed: {e}"))
    })?;
    Ok(Self { lua, modules, armed, limits })
  }

  pub fn lua(&self) -> &Lua
  {
    &self.lua
  }

  pub fn limits(&self) -> EngineLimits
  {
    self.limits
  }

  /// Replace the project modules visible to `require` and drop any cached
  /// module values.
  pub fn set_modules(
    &self,
    modules: ModuleMap,
  ) -> Result<(), SandboxError>
  {
    *self.modules.borrow_mut() = modules;
    reset_loaded(&self.lua).map_err(|e| classify(e, Phase::Execute))
  }

  /// Compile `source` without running any of it.
  pub fn load(
    &self,
    source: &str,
    name: &str,
  ) -> Result<Program, SandboxError>
  {
    self
      .lua
      .load(source)
      .set_name(format!("={name}"))
      .into_function()
      .map(|func| Program { func, name: name.to_string() })
      .map_err(|e| classify(e, Phase::Load))
  }

  /// Run a compiled chunk to completion or until it raises.
  pub fn execute(
    &self,
    program: &Program,
  ) -> Result<(), SandboxError>
  {
    program.func.call::<()>(()).map_err(|e| classify(e, Phase::Execute))
  }

  /// Abort the running script once `watchdog` trips.
  pub fn install_interrupt(
    &self,
    watchdog: Watchdog,
  )
  {
    *self.armed.borrow_mut() = Some(watchdog);
  }

  pub fn clear_interrupt(&self)
  {
    self.armed.borrow_mut().take();
  }
}

// Installed once per state as a global hook so every coroutine inherits it.
// Call events make a tripped watchdog inescapable: `pcall` itself is a call,
// so the error is raised in the unprotected caller.
fn install_hook(
  lua: &Lua,
  interval: u32,
  armed: Rc<RefCell<Option<Watchdog>>>,
) -> mlua::Result<()>
{
  let triggers = HookTriggers::new()
    .on_calls()
    .every_nth_instruction(interval.max(1));
  lua.set_global_hook(triggers, move |_lua, _debug| {
    let hit = armed.borrow().as_ref().and_then(Watchdog::check);
    match hit
    {
      Some(reason) => Err(LuaError::RuntimeError(reason.to_string())),
      None => Ok(VmState::Continue),
    }
  })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase
{
  Load,
  Execute,
}

/// Map an mlua error onto the sandbox taxonomy.
fn classify(
  err: LuaError,
  phase: Phase,
) -> SandboxError
{
  match err
  {
    LuaError::SyntaxError { message, .. } if phase == Phase::Load =>
    {
      SandboxError::parse(message)
    }
    LuaError::SyntaxError { message, .. } => SandboxError::runtime(message),
    LuaError::RuntimeError(msg) | LuaError::MemoryError(msg) =>
    {
      SandboxError::runtime(msg)
    }
    LuaError::CallbackError { cause, .. } => classify((*cause).clone(), phase),
    LuaError::WithContext { cause, .. } => classify((*cause).clone(), phase),
    e @ (LuaError::SafetyError(_)
    | LuaError::StackError
    | LuaError::RecursiveMutCallback
    | LuaError::CallbackDestructed
    | LuaError::PreviouslyResumedPanic) => SandboxError::InternalFault(e.to_string()),
    other => SandboxError::runtime(other.to_string()),
  }
}
