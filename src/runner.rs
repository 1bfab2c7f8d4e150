//! Runner facade: the only entry point the host uses to execute scripts.
//!
//! A [`Runner`] is constructed explicitly by the host and passed by reference
//! to whatever issues run requests. It owns a worker thread which in turn
//! owns the interpreter [`Environment`]; requests are queued FIFO and run one
//! at a time. Output flows back over a bounded channel per run, so a chatty
//! script is throttled by the consumer rather than buffered without limit.
//! A script waiting on a full channel still honours its deadline and
//! cancellation.

use std::{
  cell::Cell,
  io,
  rc::Rc,
  sync::{
    Arc,
    Mutex,
    mpsc::{
      self,
      Receiver,
      Sender,
      SyncSender,
      TryRecvError,
      TrySendError,
    },
  },
  thread::{
    self,
    JoinHandle,
  },
  time::Duration,
};

use crate::{
  sandbox::{
    CancelToken,
    EngineLimits,
    EnvPolicy,
    Environment,
    ExecutionOutcome,
    MessageKind,
    ModuleMap,
    OutputMessage,
    OutputSink,
    SandboxError,
    Session,
    SessionOptions,
  },
  trace,
};

/// Pause between attempts to push an event into a full run channel.
const SEND_BACKOFF: Duration = Duration::from_millis(2);

/// Runner settings; see the `runner` block of `init.lua`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig
{
  /// Wall-clock budget for one `execute`.
  pub timeout:         Duration,
  /// Instructions between deadline/cancel checks.
  pub hook_interval:   u32,
  /// Output messages buffered before a printing script blocks.
  pub output_capacity: usize,
  pub env_policy:      EnvPolicy,
  /// Lua allocator cap in bytes.
  pub memory_limit:    Option<usize>,
}

impl Default for RunnerConfig
{
  fn default() -> Self
  {
    let limits = EngineLimits::default();
    Self {
      timeout:         Duration::from_secs(5),
      hook_interval:   limits.hook_interval,
      output_capacity: 256,
      env_policy:      EnvPolicy::Recreate,
      memory_limit:    limits.memory_limit,
    }
  }
}

impl RunnerConfig
{
  pub fn limits(&self) -> EngineLimits
  {
    EngineLimits {
      memory_limit:  self.memory_limit,
      hook_interval: self.hook_interval,
    }
  }
}

/// Source text plus what it needs to run.
#[derive(Debug, Clone, Default)]
pub struct RunRequest
{
  pub source:     String,
  pub chunk_name: String,
  pub modules:    ModuleMap,
}

impl RunRequest
{
  pub fn new<S: Into<String>>(source: S) -> Self
  {
    Self {
      source:     source.into(),
      chunk_name: String::from("main.lua"),
      modules:    ModuleMap::new(),
    }
  }

  pub fn with_name<S: Into<String>>(
    mut self,
    name: S,
  ) -> Self
  {
    self.chunk_name = name.into();
    self
  }

  pub fn with_module<N: Into<String>, C: Into<String>>(
    mut self,
    name: N,
    code: C,
  ) -> Self
  {
    self.modules.insert(name.into(), code.into());
    self
  }

  pub fn with_modules(
    mut self,
    modules: ModuleMap,
  ) -> Self
  {
    self.modules.extend(modules);
    self
  }
}

/// What a run produces, in order: zero or more `Output`, then one `Finished`.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent
{
  Output(OutputMessage),
  Finished(ExecutionOutcome),
}

struct Job
{
  request: RunRequest,
  cancel:  CancelToken,
  events:  SyncSender<RunEvent>,
}

/// The event stream of one submitted run.
///
/// Dropping the handle before `Finished` cancels the run.
pub struct RunHandle
{
  events:   Receiver<RunEvent>,
  cancel:   CancelToken,
  finished: bool,
}

impl RunHandle
{
  pub fn cancel(&self)
  {
    self.cancel.cancel();
  }

  /// Discard remaining output and return the outcome.
  pub fn wait(self) -> ExecutionOutcome
  {
    let mut outcome = None;
    for ev in self
    {
      if let RunEvent::Finished(o) = ev
      {
        outcome = Some(o);
      }
    }
    outcome.unwrap_or_else(runner_gone)
  }

  /// Next event if one is ready; never blocks.
  pub fn try_next(&mut self) -> Option<RunEvent>
  {
    if self.finished
    {
      return None;
    }
    match self.events.try_recv()
    {
      Ok(ev) =>
      {
        if matches!(ev, RunEvent::Finished(_))
        {
          self.finished = true;
        }
        Some(ev)
      }
      Err(TryRecvError::Empty) => None,
      Err(TryRecvError::Disconnected) =>
      {
        self.finished = true;
        Some(RunEvent::Finished(runner_gone()))
      }
    }
  }

  pub fn is_finished(&self) -> bool
  {
    self.finished
  }
}

impl Iterator for RunHandle
{
  type Item = RunEvent;

  fn next(&mut self) -> Option<RunEvent>
  {
    if self.finished
    {
      return None;
    }
    match self.events.recv()
    {
      Ok(ev) =>
      {
        if matches!(ev, RunEvent::Finished(_))
        {
          self.finished = true;
        }
        Some(ev)
      }
      Err(_) =>
      {
        self.finished = true;
        Some(RunEvent::Finished(runner_gone()))
      }
    }
  }
}

impl Drop for RunHandle
{
  fn drop(&mut self)
  {
    if !self.finished
    {
      self.cancel.cancel();
    }
  }
}

thread_local! {
  static IN_RUN: Cell<bool> = const { Cell::new(false) };
}

struct InRunGuard;

impl Drop for InRunGuard
{
  fn drop(&mut self)
  {
    IN_RUN.with(|f| f.set(false));
  }
}

fn runner_gone() -> ExecutionOutcome
{
  ExecutionOutcome::RuntimeFailed(SandboxError::InternalFault(String::from(
    "runner stopped before the run finished",
  )))
}

/// Serialises script runs against one interpreter environment.
pub struct Runner
{
  config:   RunnerConfig,
  jobs:     Option<Sender<Job>>,
  active:   Arc<Mutex<Option<CancelToken>>>,
  shutdown: CancelToken,
  worker:   Option<JoinHandle<()>>,
}

impl Runner
{
  /// Start the worker thread. The Lua state itself is created lazily on the
  /// first run.
  pub fn new(config: RunnerConfig) -> io::Result<Self>
  {
    let (tx, rx) = mpsc::channel::<Job>();
    let active = Arc::new(Mutex::new(None));
    let shutdown = CancelToken::new();
    let worker = {
      let config = config.clone();
      let active = Arc::clone(&active);
      let shutdown = shutdown.clone();
      thread::Builder::new()
        .name(String::from("lua-runner"))
        .spawn(move || worker_loop(config, rx, active, shutdown))?
    };
    trace::log(format!(
      "[runner] started: timeout={}ms policy={} capacity={}",
      config.timeout.as_millis(),
      config.env_policy.as_str(),
      config.output_capacity
    ));
    Ok(Self {
      config,
      jobs: Some(tx),
      active,
      shutdown,
      worker: Some(worker),
    })
  }

  pub fn config(&self) -> &RunnerConfig
  {
    &self.config
  }

  /// Queue a run and return its event stream.
  pub fn submit(
    &self,
    request: RunRequest,
  ) -> RunHandle
  {
    let (tx, rx) = mpsc::sync_channel(self.config.output_capacity.max(1));
    let cancel = CancelToken::new();
    let job = Job { request, cancel: cancel.clone(), events: tx };
    let queued = match self.jobs.as_ref()
    {
      Some(jobs) => jobs.send(job).is_ok(),
      None => false,
    };
    if !queued
    {
      trace::log("[runner] submit after worker exit");
    }
    RunHandle { events: rx, cancel, finished: false }
  }

  /// Run `source` and block until it finishes.
  ///
  /// Every print reaches `on_output` in order; a failure is reported through
  /// exactly one `on_error` call after the last output. Never panics and
  /// never returns an error: the outcome is returned for callers that care.
  pub fn run<O, E>(
    &self,
    source: &str,
    on_output: O,
    on_error: E,
  ) -> ExecutionOutcome
  where
    O: FnMut(&str, MessageKind),
    E: FnMut(&str),
  {
    self.run_request(RunRequest::new(source), on_output, on_error)
  }

  /// Like [`run`](Self::run) with a chunk name and project modules.
  pub fn run_request<O, E>(
    &self,
    request: RunRequest,
    mut on_output: O,
    mut on_error: E,
  ) -> ExecutionOutcome
  where
    O: FnMut(&str, MessageKind),
    E: FnMut(&str),
  {
    if IN_RUN.with(|f| f.replace(true))
    {
      // A nested run would queue behind the one feeding this callback.
      let outcome = ExecutionOutcome::RuntimeFailed(SandboxError::InternalFault(
        String::from("run called from inside a running script's callback"),
      ));
      if let Some(diag) = outcome.diagnostic()
      {
        on_error(&diag);
      }
      return outcome;
    }
    let _guard = InRunGuard;
    let mut outcome = None;
    for ev in self.submit(request)
    {
      match ev
      {
        RunEvent::Output(m) => on_output(&m.text, m.kind),
        RunEvent::Finished(o) =>
        {
          if let Some(diag) = o.diagnostic()
          {
            on_error(&diag);
          }
          outcome = Some(o);
        }
      }
    }
    outcome.unwrap_or_else(runner_gone)
  }

  /// Cancel the run currently executing, if any. Safe from any thread.
  pub fn cancel(&self) -> bool
  {
    let guard = self.active.lock().unwrap_or_else(|e| e.into_inner());
    match guard.as_ref()
    {
      Some(token) =>
      {
        trace::log("[runner] cancel requested");
        token.cancel();
        true
      }
      None => false,
    }
  }

  pub fn is_busy(&self) -> bool
  {
    self.active.lock().map(|g| g.is_some()).unwrap_or(false)
  }
}

impl Drop for Runner
{
  fn drop(&mut self)
  {
    self.shutdown.cancel();
    self.cancel();
    self.jobs.take();
    if let Some(worker) = self.worker.take()
      && worker.join().is_err()
    {
      trace::log("[runner] worker panicked");
    }
    trace::log("[runner] stopped");
  }
}

fn worker_loop(
  config: RunnerConfig,
  jobs: Receiver<Job>,
  active: Arc<Mutex<Option<CancelToken>>>,
  shutdown: CancelToken,
)
{
  let mut env = Environment::new(config.env_policy, config.limits());
  while let Ok(Job { request, cancel, events }) = jobs.recv()
  {
    set_active(&active, Some(cancel.clone()));
    // Checked after publishing the token so a concurrent Runner::drop either
    // sees it or has already raised `shutdown`.
    if shutdown.is_cancelled()
    {
      cancel.cancel();
    }
    trace::log(format!(
      "[runner] run {} ({} bytes, {} modules)",
      request.chunk_name,
      request.source.len(),
      request.modules.len()
    ));

    let options = SessionOptions {
      chunk_name: request.chunk_name,
      timeout: config.timeout,
      cancel,
      modules: request.modules,
    };
    let mut session = Session::new(&mut env, options);
    let watchdog = session.watchdog();
    let out = events.clone();
    let sink: OutputSink = Rc::new(move |m: OutputMessage| {
      deliver(&out, RunEvent::Output(m), || watchdog.check().is_some())
    });
    let outcome = session.run(&request.source, sink);

    set_active(&active, None);
    if !deliver(&events, RunEvent::Finished(outcome), || shutdown.is_cancelled())
    {
      trace::log("[runner] run finished after its consumer left");
    }
  }
  trace::log("[runner] queue closed");
}

/// Push `ev` without ever blocking indefinitely: while the channel is full,
/// retry until the consumer drains it or `give_up` says to stop. Returns
/// `false` if the event was not delivered.
fn deliver(
  events: &SyncSender<RunEvent>,
  mut ev: RunEvent,
  give_up: impl Fn() -> bool,
) -> bool
{
  loop
  {
    match events.try_send(ev)
    {
      Ok(()) => return true,
      Err(TrySendError::Disconnected(_)) => return false,
      Err(TrySendError::Full(back)) =>
      {
        if give_up()
        {
          return false;
        }
        ev = back;
        thread::sleep(SEND_BACKOFF);
      }
    }
  }
}

fn set_active(
  active: &Mutex<Option<CancelToken>>,
  token: Option<CancelToken>,
)
{
  let mut guard = active.lock().unwrap_or_else(|e| e.into_inner());
  *guard = token;
}
