//! One-shot orchestration of a single script run.
//!
//! A [`Session`] walks `Idle -> Loading -> Executing -> {Completed | Failed}
//! -> Closed`. Parse failures go straight from `Loading` to `Failed`. The
//! `Closed` transition always runs: the output hook is removed, the
//! instruction hook is cleared and the [`Environment`] decides whether the
//! Lua state survives for the next run.

use std::{
  panic::{
    self,
    AssertUnwindSafe,
  },
  time::{
    Duration,
    Instant,
  },
};

use super::{
  CancelToken,
  binding::{
    EngineLimits,
    Interrupt,
    LuaEngine,
    Watchdog,
  },
  error::{
    ExecutionOutcome,
    SandboxError,
  },
  output::{
    OutputChannel,
    OutputSink,
  },
  require::ModuleMap,
};
use crate::trace;

/// What happens to global state between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvPolicy
{
  /// Every run gets a fresh Lua state.
  #[default]
  Recreate,
  /// Globals persist across runs as long as the previous run did not fail
  /// while executing.
  Reuse,
}

impl EnvPolicy
{
  pub fn as_str(self) -> &'static str
  {
    match self
    {
      EnvPolicy::Recreate => "recreate",
      EnvPolicy::Reuse => "reuse",
    }
  }

  pub fn from_str_opt(s: &str) -> Option<Self>
  {
    match s.trim().to_ascii_lowercase().as_str()
    {
      "recreate" | "fresh" => Some(EnvPolicy::Recreate),
      "reuse" | "persist" => Some(EnvPolicy::Reuse),
      _ => None,
    }
  }
}

/// Owner of the single interpreter environment behind a runner.
pub struct Environment
{
  policy:     EnvPolicy,
  limits:     EngineLimits,
  engine:     Option<LuaEngine>,
  reusable:   bool,
  generation: u64,
}

impl Environment
{
  pub fn new(
    policy: EnvPolicy,
    limits: EngineLimits,
  ) -> Self
  {
    Self { policy, limits, engine: None, reusable: false, generation: 0 }
  }

  pub fn policy(&self) -> EnvPolicy
  {
    self.policy
  }

  /// Number of Lua states created so far.
  pub fn generation(&self) -> u64
  {
    self.generation
  }

  fn acquire(&mut self) -> Result<&LuaEngine, SandboxError>
  {
    let keep = self.policy == EnvPolicy::Reuse && self.reusable;
    if !keep || self.engine.is_none()
    {
      self.engine = None;
      let engine = LuaEngine::new(self.limits)?;
      self.generation += 1;
      trace::log(format!("[session] new lua state #{}", self.generation));
      self.engine = Some(engine);
    }
    // Dirty until the run closes cleanly.
    self.reusable = false;
    self.engine.as_ref().ok_or_else(|| {
      SandboxError::InternalFault(String::from("no interpreter environment"))
    })
  }

  fn release(
    &mut self,
    clean: bool,
  )
  {
    if self.policy == EnvPolicy::Recreate || !clean
    {
      self.engine = None;
      self.reusable = false;
    }
    else
    {
      self.reusable = true;
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState
{
  Idle,
  Loading,
  Executing,
  Completed,
  Failed,
  Closed,
}

/// Per-run parameters.
#[derive(Clone)]
pub struct SessionOptions
{
  pub chunk_name: String,
  pub timeout:    Duration,
  pub cancel:     CancelToken,
  pub modules:    ModuleMap,
}

impl Default for SessionOptions
{
  fn default() -> Self
  {
    Self {
      chunk_name: String::from("main.lua"),
      timeout:    Duration::from_secs(5),
      cancel:     CancelToken::new(),
      modules:    ModuleMap::new(),
    }
  }
}

struct StateLog
{
  name:    String,
  current: SessionState,
  history: Vec<SessionState>,
}

impl StateLog
{
  fn transition(
    &mut self,
    next: SessionState,
  )
  {
    trace::log(format!(
      "[session] {}: {:?} -> {:?}",
      self.name, self.current, next
    ));
    self.current = next;
    self.history.push(next);
  }
}

/// A single run against an [`Environment`].
pub struct Session<'env>
{
  env:      &'env mut Environment,
  options:  SessionOptions,
  watchdog: Watchdog,
  log:      StateLog,
}

impl<'env> Session<'env>
{
  pub fn new(
    env: &'env mut Environment,
    options: SessionOptions,
  ) -> Self
  {
    let log = StateLog {
      name:    options.chunk_name.clone(),
      current: SessionState::Idle,
      history: vec![SessionState::Idle],
    };
    let watchdog = Watchdog::new(options.cancel.clone());
    Self { env, options, watchdog, log }
  }

  /// The deadline/cancel state of this run. Hand it to an output sink that
  /// may block so it can give up when the run is interrupted.
  pub fn watchdog(&self) -> Watchdog
  {
    self.watchdog.clone()
  }

  pub fn state(&self) -> SessionState
  {
    self.log.current
  }

  /// Every state the session has been in, in order.
  pub fn history(&self) -> &[SessionState]
  {
    &self.log.history
  }

  /// Load and execute `source`, sending each `print` to `sink`.
  ///
  /// Never panics and never returns early: whatever happens, the session
  /// ends in `Closed` with the environment released.
  pub fn run(
    &mut self,
    source: &str,
    sink: OutputSink,
  ) -> ExecutionOutcome
  {
    if self.log.current != SessionState::Idle
    {
      return ExecutionOutcome::RuntimeFailed(SandboxError::InternalFault(
        String::from("session already used"),
      ));
    }
    self.log.transition(SessionState::Loading);
    let started = Instant::now();
    let mut channel = OutputChannel::new();
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
      self.drive(source, sink, &mut channel)
    }));
    let outcome = match result
    {
      Ok(Ok(())) => ExecutionOutcome::Completed,
      Ok(Err(e)) => ExecutionOutcome::from_error(e),
      Err(payload) =>
      {
        let msg = trace::panic_message(payload.as_ref());
        trace::log(format!("[session] {}: panic: {msg}", self.log.name));
        ExecutionOutcome::RuntimeFailed(SandboxError::InternalFault(msg))
      }
    };
    if outcome.is_completed()
    {
      self.log.transition(SessionState::Completed);
    }
    else
    {
      self.log.transition(SessionState::Failed);
    }
    self.close(&mut channel, &outcome);
    trace::log(format!(
      "[session] {}: {:?} in {}ms",
      self.log.name,
      outcome,
      started.elapsed().as_millis()
    ));
    outcome
  }

  fn drive(
    &mut self,
    source: &str,
    sink: OutputSink,
    channel: &mut OutputChannel,
  ) -> Result<(), SandboxError>
  {
    if self.watchdog.check().is_some()
    {
      return Err(SandboxError::Cancelled);
    }
    let timeout = self.options.timeout;
    let modules = std::mem::take(&mut self.options.modules);
    let engine = self.env.acquire()?;
    engine.set_modules(modules)?;
    channel.install(engine.lua(), sink).map_err(|e| {
      SandboxError::InternalFault(format!("output hook install failed: {e}"))
    })?;
    let program = engine.load(source, &self.options.chunk_name)?;
    if self.watchdog.check().is_some()
    {
      return Err(SandboxError::Cancelled);
    }

    self.log.transition(SessionState::Executing);
    self.watchdog.arm(Instant::now() + timeout);
    engine.install_interrupt(self.watchdog.clone());
    let result = engine.execute(&program);
    engine.clear_interrupt();
    match self.watchdog.tripped()
    {
      Some(Interrupt::Timeout) => Err(SandboxError::Timeout(timeout)),
      Some(Interrupt::Cancelled) => Err(SandboxError::Cancelled),
      None => result,
    }
  }

  fn close(
    &mut self,
    channel: &mut OutputChannel,
    outcome: &ExecutionOutcome,
  )
  {
    let mut clean = outcome.error().is_none_or(|e| !e.taints_environment());
    if let Some(engine) = self.env.engine.as_ref()
    {
      engine.clear_interrupt();
      if let Err(e) = channel.uninstall(engine.lua())
      {
        trace::log(format!("[session] output hook uninstall failed: {e}"));
        clean = false;
      }
    }
    self.env.release(clean);
    self.log.transition(SessionState::Closed);
  }
}
