//! Script-execution sandbox: interpreter binding, output interception and the
//! per-run session state machine.

pub mod binding;
pub mod error;
pub mod message;
pub mod output;
pub mod require;
pub mod session;

use std::sync::{
  Arc,
  atomic::{
    AtomicBool,
    Ordering,
  },
};

pub use binding::{
  EngineLimits,
  Interrupt,
  LuaEngine,
  Program,
  Watchdog,
};
pub use error::{
  ExecutionOutcome,
  SandboxError,
};
pub use message::{
  MessageKind,
  OutputMessage,
};
pub use output::{
  OutputChannel,
  OutputSink,
};
pub use require::ModuleMap;
pub use session::{
  EnvPolicy,
  Environment,
  Session,
  SessionOptions,
  SessionState,
};

/// Shared flag used to stop a running script from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken
{
  pub fn new() -> Self
  {
    Self::default()
  }

  pub fn cancel(&self)
  {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool
  {
    self.0.load(Ordering::SeqCst)
  }
}
