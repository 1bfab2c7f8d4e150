use luastudio::{
  App,
  Runner,
  RunnerConfig,
  app::{
    Focus,
    NEW_FILE_CONTENT,
    POLL_BATCH,
  },
  config::Config,
  sandbox::{
    ExecutionOutcome,
    MessageKind,
  },
};

fn app() -> App
{
  App::new(Config::default())
}

fn log(app: &App) -> Vec<(MessageKind, String)>
{
  app.terminal().messages().iter().map(|m| (m.kind, m.text.clone())).collect()
}

#[test]
fn starts_with_main_lua_open()
{
  let app = app();
  assert_eq!(app.tabs().open_ids(), &["main.lua".to_string()]);
  assert_eq!(app.active_file().map(|n| n.name.as_str()), Some("main.lua"));
  assert_eq!(app.focus(), Focus::Editor);
  assert!(app.terminal().messages().is_empty());
}

#[test]
fn running_the_sample_project()
{
  let runner = Runner::new(RunnerConfig::default()).unwrap();
  let mut app = app();
  let outcome = app.run_active(&runner).unwrap();
  assert!(outcome.is_completed(), "{outcome:?}");
  assert_eq!(log(&app), vec![
    (MessageKind::Input, "lua main.lua".to_string()),
    (MessageKind::Info, "Starting summation script...".to_string()),
    (MessageKind::Info, "Result: 30".to_string()),
    (MessageKind::Info, "Condition met: Value exceeds 25".to_string()),
    (MessageKind::Success, "main.lua finished".to_string()),
  ]);
}

#[test]
fn run_without_a_file_reports_an_error()
{
  let runner = Runner::new(RunnerConfig::default()).unwrap();
  let mut app = app();
  app.close_active_tab();
  assert!(app.active_file().is_none());
  assert!(app.run_active(&runner).is_none());
  assert_eq!(log(&app), vec![(
    MessageKind::Error,
    "No file selected or invalid file.".to_string()
  )]);
}

#[test]
fn failing_script_logs_output_then_diagnostic()
{
  let runner = Runner::new(RunnerConfig::default()).unwrap();
  let mut app = app();
  app.update_content("main.lua", "print('a')\nprint('b')\nerror('boom')".to_string());
  let outcome = app.run_active(&runner).unwrap();
  assert!(matches!(outcome, ExecutionOutcome::RuntimeFailed(_)));
  let entries = log(&app);
  assert_eq!(entries.len(), 4);
  assert_eq!(entries[1], (MessageKind::Info, "a".to_string()));
  assert_eq!(entries[2], (MessageKind::Info, "b".to_string()));
  assert_eq!(entries[3], (MessageKind::Error, "line 3: boom".to_string()));
}

#[test]
fn sibling_files_are_requirable()
{
  let runner = Runner::new(RunnerConfig::default()).unwrap();
  let mut app = app();
  app.update_content(
    "main.lua",
    "local u = require('utils')\nu.greet('tree')\nrequire('src.utils').greet('dotted')"
      .to_string(),
  );
  let outcome = app.run_active(&runner).unwrap();
  assert!(outcome.is_completed(), "{outcome:?}");
  let infos: Vec<String> = log(&app)
    .into_iter()
    .filter(|(k, _)| *k == MessageKind::Info)
    .map(|(_, t)| t)
    .collect();
  assert_eq!(infos, vec!["Hello, tree", "Hello, dotted"]);
}

#[test]
fn new_file_opens_in_a_tab()
{
  let mut app = app();
  let id = app.create_file("src", "scratch.lua").unwrap();
  assert_eq!(app.tabs().active(), Some(id.as_str()));
  assert_eq!(app.active_file().map(|n| n.content.as_str()), Some(NEW_FILE_CONTENT));
  assert!(app.create_file("src", "scratch.lua").is_none());
  let last = log(&app).pop().unwrap();
  assert_eq!(last.0, MessageKind::Error);
}

#[test]
fn closing_tabs_falls_back_to_the_last_one()
{
  let mut app = app();
  app.select_file("utils.lua");
  app.select_file("config.json");
  app.select_file("utils.lua");
  app.close_tab("utils.lua");
  assert_eq!(app.tabs().active(), Some("config.json"));
  app.close_tab("config.json");
  assert_eq!(app.tabs().active(), Some("main.lua"));
  app.close_tab("main.lua");
  assert_eq!(app.tabs().active(), None);
}

#[test]
fn running_a_non_lua_file_still_goes_through_the_sandbox()
{
  let runner = Runner::new(RunnerConfig::default()).unwrap();
  let mut app = app();
  app.select_file("config.json");
  let outcome = app.run_active(&runner).unwrap();
  assert!(matches!(outcome, ExecutionOutcome::ParseFailed(_)));
  let entries = log(&app);
  assert_eq!(entries[0], (MessageKind::Input, "lua config.json".to_string()));
  assert_eq!(entries.len(), 2);
  assert_eq!(entries[1].0, MessageKind::Error);
}

#[test]
fn editing_updates_the_file_content()
{
  let mut app = app();
  app.create_file("src", "e.lua").unwrap();
  app.cursor_end();
  app.insert_char('\n');
  for ch in "print(1)".chars()
  {
    app.insert_char(ch);
  }
  app.backspace();
  app.insert_char(')');
  assert_eq!(
    app.active_file().map(|n| n.content.clone()),
    Some(format!("{NEW_FILE_CONTENT}\nprint(1)"))
  );
}

#[test]
fn background_run_is_polled_into_the_log()
{
  let runner = Runner::new(RunnerConfig::default()).unwrap();
  let mut app = app();
  app.update_content("main.lua", "print('bg')".to_string());
  assert!(app.start_run(&runner));
  assert!(!app.start_run(&runner));
  let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
  while app.is_running() && std::time::Instant::now() < deadline
  {
    app.poll_run();
    std::thread::sleep(std::time::Duration::from_millis(5));
  }
  assert!(!app.is_running());
  assert_eq!(log(&app), vec![
    (MessageKind::Input, "lua main.lua".to_string()),
    (MessageKind::Info, "bg".to_string()),
    (MessageKind::Success, "main.lua finished".to_string()),
  ]);
}

#[test]
fn clearing_the_terminal()
{
  let mut app = app();
  app.add_message("x", MessageKind::Info);
  app.clear_terminal();
  assert!(app.terminal().messages().is_empty());
}

#[test]
fn polling_moves_a_bounded_batch_per_call()
{
  let runner = Runner::new(RunnerConfig {
    output_capacity: 4 * POLL_BATCH,
    ..RunnerConfig::default()
  })
  .unwrap();
  let mut app = app();
  let prints = 2 * POLL_BATCH + 10;
  app.update_content("main.lua", format!("for i = 1, {prints} do print(i) end"));
  assert!(app.start_run(&runner));
  // Let the whole run land in the channel before the first poll.
  std::thread::sleep(std::time::Duration::from_millis(100));
  let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
  while runner.is_busy() && std::time::Instant::now() < deadline
  {
    std::thread::sleep(std::time::Duration::from_millis(5));
  }

  assert!(app.poll_run());
  // "lua main.lua" plus one batch of prints
  assert_eq!(app.terminal().messages().len(), 1 + POLL_BATCH);
  assert!(app.is_running());

  while app.is_running() && std::time::Instant::now() < deadline
  {
    app.poll_run();
  }
  let entries = log(&app);
  assert_eq!(entries.len(), 1 + prints + 1);
  assert_eq!(entries.last().unwrap().0, MessageKind::Success);
}
