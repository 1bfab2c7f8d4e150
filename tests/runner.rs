use std::{
  cell::RefCell,
  sync::{
    Arc,
    mpsc,
  },
  thread,
  time::{
    Duration,
    Instant,
  },
};

use luastudio::{
  RunEvent,
  RunRequest,
  Runner,
  RunnerConfig,
  sandbox::{
    EnvPolicy,
    ExecutionOutcome,
    MessageKind,
    SandboxError,
  },
};

#[derive(Debug, Clone, PartialEq)]
enum Call
{
  Output(String, MessageKind),
  Error(String),
}

fn runner_with(config: RunnerConfig) -> Runner
{
  Runner::new(config).expect("runner")
}

fn runner() -> Runner
{
  runner_with(RunnerConfig::default())
}

/// Run `source` and record every callback in order.
fn record(
  runner: &Runner,
  source: &str,
) -> (ExecutionOutcome, Vec<Call>)
{
  let calls = RefCell::new(Vec::new());
  let outcome = runner.run(
    source,
    |text, kind| calls.borrow_mut().push(Call::Output(text.to_string(), kind)),
    |diag| calls.borrow_mut().push(Call::Error(diag.to_string())),
  );
  (outcome, calls.into_inner())
}

fn outputs(calls: &[Call]) -> Vec<&str>
{
  calls
    .iter()
    .filter_map(|c| match c
    {
      Call::Output(t, _) => Some(t.as_str()),
      Call::Error(_) => None,
    })
    .collect()
}

fn errors(calls: &[Call]) -> Vec<&str>
{
  calls
    .iter()
    .filter_map(|c| match c
    {
      Call::Error(t) => Some(t.as_str()),
      Call::Output(..) => None,
    })
    .collect()
}

#[test]
fn invalid_syntax_yields_one_error_and_no_output()
{
  let r = runner();
  for source in ["print('a'", "x = = 1", "print('never')\nend", "local function f( end"]
  {
    let (outcome, calls) = record(&r, source);
    assert!(matches!(outcome, ExecutionOutcome::ParseFailed(_)), "{source}");
    assert!(outputs(&calls).is_empty(), "{source}: {calls:?}");
    assert_eq!(errors(&calls).len(), 1, "{source}: {calls:?}");
  }
}

#[test]
fn unmatched_end_reports_a_parse_diagnostic()
{
  let r = runner();
  let (outcome, calls) = record(&r, "print('hello')\nend");
  assert_eq!(calls.len(), 1);
  let Call::Error(diag) = &calls[0]
  else
  {
    panic!("expected an error, got {calls:?}");
  };
  assert!(diag.starts_with("line 2:"), "{diag}");
  assert!(diag.contains("'<eof>' expected"), "{diag}");
  assert_eq!(outcome.error().and_then(|e| e.line()), Some(2));
}

#[test]
fn literal_prints_arrive_in_order_as_info()
{
  let r = runner();
  let words = ["alpha", "beta", "", "gamma delta", "épsilon"];
  let source: String =
    words.iter().map(|w| format!("print(\"{w}\")\n")).collect();
  let (outcome, calls) = record(&r, &source);
  assert!(outcome.is_completed());
  let expected: Vec<Call> = words
    .iter()
    .map(|w| Call::Output(w.to_string(), MessageKind::Info))
    .collect();
  assert_eq!(calls, expected);
}

#[test]
fn error_after_prints_comes_last_and_once()
{
  let r = runner();
  let (outcome, calls) = record(&r, r#"print("a") print("b") error("boom")"#);
  assert_eq!(calls.len(), 3, "{calls:?}");
  assert_eq!(calls[0], Call::Output("a".into(), MessageKind::Info));
  assert_eq!(calls[1], Call::Output("b".into(), MessageKind::Info));
  match &calls[2]
  {
    Call::Error(diag) => assert!(diag.contains("boom"), "{diag}"),
    other => panic!("unexpected: {other:?}"),
  }
  assert!(matches!(
    outcome,
    ExecutionOutcome::RuntimeFailed(SandboxError::Runtime { .. })
  ));
}

#[test]
fn n_prints_then_error_yields_n_outputs()
{
  let r = runner();
  for n in [0usize, 1, 7, 300]
  {
    let source = format!("for i = 1, {n} do print(i) end\nerror('stop')");
    let (_, calls) = record(&r, &source);
    assert_eq!(outputs(&calls).len(), n);
    assert_eq!(errors(&calls).len(), 1);
    assert!(matches!(calls.last(), Some(Call::Error(_))));
  }
}

#[test]
fn recreate_policy_gives_identical_runs()
{
  let r = runner();
  let source = "count = (count or 0) + 1\nprint(count)";
  let (_, first) = record(&r, source);
  let (_, second) = record(&r, source);
  assert_eq!(first, second);
  assert_eq!(outputs(&first), vec!["1"]);

  let (_, read) = record(&r, "print(count)");
  assert_eq!(outputs(&read), vec!["nil"]);
}

#[test]
fn reuse_policy_shares_globals_after_completed_runs_only()
{
  let r = runner_with(RunnerConfig { env_policy: EnvPolicy::Reuse, ..RunnerConfig::default() });
  let (outcome, _) = record(&r, "shared = 'set'");
  assert!(outcome.is_completed());
  let (_, calls) = record(&r, "print(shared)");
  assert_eq!(outputs(&calls), vec!["set"]);

  // A run that fails after writing a global does not leak it.
  let (outcome, _) = record(&r, "shared = 'tainted' error('x')");
  assert!(!outcome.is_completed());
  let (_, calls) = record(&r, "print(shared)");
  assert_eq!(outputs(&calls), vec!["nil"]);
}

#[test]
fn infinite_loop_times_out_and_runner_recovers()
{
  let r = runner_with(RunnerConfig {
    timeout: Duration::from_millis(200),
    ..RunnerConfig::default()
  });
  let started = Instant::now();
  let (outcome, calls) = record(&r, "print('spin') while true do end");
  assert!(started.elapsed() < Duration::from_secs(5));
  assert_eq!(
    outcome,
    ExecutionOutcome::RuntimeFailed(SandboxError::Timeout(Duration::from_millis(200)))
  );
  assert_eq!(outputs(&calls), vec!["spin"]);
  assert_eq!(errors(&calls), vec!["timeout: script exceeded 200ms"]);

  let (outcome, calls) = record(&r, "print('next')");
  assert!(outcome.is_completed());
  assert_eq!(outputs(&calls), vec!["next"]);
}

#[test]
fn cancel_from_another_thread()
{
  let r = Arc::new(runner_with(RunnerConfig {
    timeout: Duration::from_secs(30),
    ..RunnerConfig::default()
  }));
  let remote = Arc::clone(&r);
  let canceller = thread::spawn(move || {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !remote.is_busy() && Instant::now() < deadline
    {
      thread::sleep(Duration::from_millis(5));
    }
    thread::sleep(Duration::from_millis(20));
    remote.cancel()
  });
  let (outcome, calls) = record(&r, "while true do end");
  assert!(canceller.join().unwrap());
  assert_eq!(outcome, ExecutionOutcome::RuntimeFailed(SandboxError::Cancelled));
  assert_eq!(errors(&calls), vec!["cancelled"]);
  assert!(!r.is_busy());
  assert!(!r.cancel());
}

#[test]
fn submitted_runs_finish_in_fifo_order()
{
  let r = runner();
  let handles: Vec<_> = (0..5)
    .map(|i| r.submit(RunRequest::new(format!("print({i})")).with_name(format!("job{i}.lua"))))
    .collect();
  for (i, handle) in handles.into_iter().enumerate()
  {
    let events: Vec<RunEvent> = handle.collect();
    assert_eq!(events.len(), 2);
    match (&events[0], &events[1])
    {
      (RunEvent::Output(m), RunEvent::Finished(o)) =>
      {
        assert_eq!(m.text, i.to_string());
        assert!(o.is_completed());
      }
      other => panic!("unexpected: {other:?}"),
    }
  }
}

#[test]
fn dropping_a_handle_cancels_its_run()
{
  let r = runner_with(RunnerConfig {
    timeout: Duration::from_secs(30),
    ..RunnerConfig::default()
  });
  let started = Instant::now();
  drop(r.submit(RunRequest::new("while true do end")));
  let (outcome, _) = record(&r, "print('after')");
  assert!(outcome.is_completed());
  assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn chatty_scripts_are_throttled_not_lost()
{
  let r = runner_with(RunnerConfig { output_capacity: 2, ..RunnerConfig::default() });
  let (outcome, calls) = record(&r, "for i = 1, 500 do print(i) end");
  assert!(outcome.is_completed());
  let got = outputs(&calls);
  assert_eq!(got.len(), 500);
  assert_eq!(got[0], "1");
  assert_eq!(got[499], "500");
}

#[test]
fn run_request_resolves_project_modules()
{
  let r = runner();
  let calls = RefCell::new(Vec::new());
  let request = RunRequest::new("local u = require('utils')\nu.greet('Lua')")
    .with_name("main.lua")
    .with_module(
      "utils",
      "return { greet = function(n) print('Hello, ' .. n) end }",
    );
  let outcome = r.run_request(
    request,
    |text, _| calls.borrow_mut().push(text.to_string()),
    |diag| calls.borrow_mut().push(format!("error: {diag}")),
  );
  assert!(outcome.is_completed());
  assert_eq!(calls.into_inner(), vec!["Hello, Lua"]);
}

#[test]
fn nested_run_from_a_callback_is_rejected()
{
  let r = runner();
  let nested = RefCell::new(None);
  let outcome = r.run(
    "print('outer')",
    |_, _| {
      let inner = r.run("print('inner')", |_, _| {}, |_| {});
      *nested.borrow_mut() = Some(inner);
    },
    |_| {},
  );
  assert!(outcome.is_completed());
  assert!(matches!(
    nested.into_inner(),
    Some(ExecutionOutcome::RuntimeFailed(SandboxError::InternalFault(_)))
  ));
}

#[test]
fn runner_is_reusable_after_many_failures()
{
  let r = runner();
  for source in ["error('a')", "if", "local t = nil; t.x = 1", "print('ok')"]
  {
    record(&r, source);
  }
  let (outcome, calls) = record(&r, "print(1 + 1)");
  assert!(outcome.is_completed());
  assert_eq!(outputs(&calls), vec!["2"]);
}

fn wait_until_idle(r: &Runner)
{
  let deadline = Instant::now() + Duration::from_secs(5);
  while r.is_busy() && Instant::now() < deadline
  {
    thread::sleep(Duration::from_millis(10));
  }
  assert!(!r.is_busy(), "run still in flight");
}

fn collect_outputs(handle: luastudio::RunHandle) -> (Vec<String>, Option<ExecutionOutcome>)
{
  let mut texts = Vec::new();
  let mut outcome = None;
  for ev in handle
  {
    match ev
    {
      RunEvent::Output(m) => texts.push(m.text),
      RunEvent::Finished(o) => outcome = Some(o),
    }
  }
  (texts, outcome)
}

#[test]
fn loops_inside_coroutines_hit_the_deadline()
{
  let r = runner_with(RunnerConfig {
    timeout: Duration::from_millis(200),
    ..RunnerConfig::default()
  });
  for source in [
    "coroutine.wrap(function() while true do end end)()",
    "local co = coroutine.create(function() while true do end end)\ncoroutine.resume(co)",
    "local co = coroutine.create(function() while true do end end)\n\
     while true do coroutine.resume(co) end",
  ]
  {
    let started = Instant::now();
    let (outcome, _) = record(&r, source);
    assert!(started.elapsed() < Duration::from_secs(5), "{source}");
    assert_eq!(
      outcome,
      ExecutionOutcome::RuntimeFailed(SandboxError::Timeout(Duration::from_millis(200))),
      "{source}"
    );
  }
}

#[test]
fn coroutine_kept_across_reused_runs_still_times_out()
{
  let r = runner_with(RunnerConfig {
    timeout: Duration::from_millis(200),
    env_policy: EnvPolicy::Reuse,
    ..RunnerConfig::default()
  });
  let (outcome, _) = record(
    &r,
    "co = coroutine.create(function() coroutine.yield() while true do end end)\n\
     coroutine.resume(co)",
  );
  assert!(outcome.is_completed(), "{outcome:?}");
  let started = Instant::now();
  let (outcome, _) = record(&r, "coroutine.resume(co)");
  assert!(started.elapsed() < Duration::from_secs(5));
  assert!(
    matches!(outcome, ExecutionOutcome::RuntimeFailed(SandboxError::Timeout(_))),
    "{outcome:?}"
  );
}

#[test]
fn cancel_reaches_a_script_blocked_on_full_output()
{
  let r = runner_with(RunnerConfig {
    timeout: Duration::from_secs(30),
    output_capacity: 4,
    ..RunnerConfig::default()
  });
  let handle = r.submit(RunRequest::new("for i = 1, 100 do print(i) end"));
  thread::sleep(Duration::from_millis(50));
  handle.cancel();
  wait_until_idle(&r);
  let (texts, outcome) = collect_outputs(handle);
  assert!(texts.len() <= 4, "{texts:?}");
  assert_eq!(outcome, Some(ExecutionOutcome::RuntimeFailed(SandboxError::Cancelled)));
}

#[test]
fn deadline_reaches_a_script_blocked_on_full_output()
{
  let r = runner_with(RunnerConfig {
    timeout: Duration::from_millis(200),
    output_capacity: 2,
    ..RunnerConfig::default()
  });
  let handle = r.submit(RunRequest::new("for i = 1, 100 do print(i) end"));
  thread::sleep(Duration::from_millis(50));
  wait_until_idle(&r);
  let (texts, outcome) = collect_outputs(handle);
  assert_eq!(texts, vec!["1", "2"]);
  assert_eq!(
    outcome,
    Some(ExecutionOutcome::RuntimeFailed(SandboxError::Timeout(Duration::from_millis(200))))
  );

  // The worker is free for the next job.
  let (outcome, _) = record(&r, "print('next')");
  assert!(outcome.is_completed());
}

#[test]
fn dropping_the_runner_with_an_undrained_handle_returns()
{
  let r = runner_with(RunnerConfig {
    timeout: Duration::from_secs(30),
    output_capacity: 4,
    ..RunnerConfig::default()
  });
  let handle = r.submit(RunRequest::new("for i = 1, 100 do print(i) end"));
  thread::sleep(Duration::from_millis(50));
  let (done_tx, done_rx) = mpsc::channel();
  thread::spawn(move || {
    drop(r);
    let _ = done_tx.send(());
  });
  assert!(done_rx.recv_timeout(Duration::from_secs(5)).is_ok(), "runner drop hung");
  let (texts, outcome) = collect_outputs(handle);
  assert!(texts.len() <= 4);
  assert!(outcome.is_some_and(|o| !o.is_completed()));
}
