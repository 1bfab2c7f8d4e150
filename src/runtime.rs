//! Terminal event loop: raw mode, redraws, key dispatch and background run
//! polling.

use std::{
  io::{
    self,
    Stdout,
  },
  time::Duration,
};

use crossterm::{
  event::{
    self,
    Event,
  },
  execute,
  terminal::{
    EnterAlternateScreen,
    LeaveAlternateScreen,
    disable_raw_mode,
    enable_raw_mode,
  },
};
use ratatui::{
  Terminal,
  backend::CrosstermBackend,
};

use crate::{
  app::App,
  runner::Runner,
  trace,
};

/// Idle wait for input between redraws.
const IDLE_TICK: Duration = Duration::from_millis(200);
/// Wait while a script is running, so its output shows up promptly.
const RUN_TICK: Duration = Duration::from_millis(30);

type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Owns raw mode and the alternate screen; restores both when dropped, on
/// every exit path.
struct TerminalGuard
{
  terminal: Tui,
}

impl TerminalGuard
{
  fn enter() -> io::Result<Self>
  {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    if let Err(e) = execute!(stdout, EnterAlternateScreen)
    {
      let _ = disable_raw_mode();
      return Err(e);
    }
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    terminal.clear()?;
    Ok(Self { terminal })
  }
}

impl Drop for TerminalGuard
{
  fn drop(&mut self)
  {
    let _ = disable_raw_mode();
    let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
    let _ = self.terminal.show_cursor();
  }
}

enum Flow
{
  Continue,
  Quit,
}

pub fn run_app(
  app: &mut App,
  runner: &Runner,
) -> Result<(), Box<dyn std::error::Error>>
{
  let mut guard = TerminalGuard::enter()?;
  let result = event_loop(&mut guard.terminal, app, runner);
  // Do not leave a script spinning until its deadline after the UI is gone.
  if app.is_running()
  {
    trace::log("[runtime] cancelling active run on exit");
    app.cancel_run();
  }
  drop(guard);
  result
}

fn event_loop(
  terminal: &mut Tui,
  app: &mut App,
  runner: &Runner,
) -> Result<(), Box<dyn std::error::Error>>
{
  let mut dirty = true;
  loop
  {
    dirty |= app.poll_run();
    if app.force_full_redraw
    {
      terminal.clear()?;
      app.force_full_redraw = false;
      dirty = true;
    }
    if dirty
    {
      terminal.draw(|f| crate::ui::draw(f, app))?;
      dirty = false;
    }

    let tick = if app.is_running() { RUN_TICK } else { IDLE_TICK };
    if !event::poll(tick)?
    {
      continue;
    }
    // Take everything already queued before drawing again, so a burst of
    // keys (or a Ctrl-C behind them) is not held up by redraws.
    loop
    {
      if let Flow::Quit = dispatch(event::read()?, app, runner)?
      {
        return Ok(());
      }
      dirty = true;
      if !event::poll(Duration::ZERO)?
      {
        break;
      }
    }
  }
}

fn dispatch(
  ev: Event,
  app: &mut App,
  runner: &Runner,
) -> io::Result<Flow>
{
  match ev
  {
    Event::Key(key) =>
    {
      if crate::input::handle_key(app, runner, key)?
      {
        return Ok(Flow::Quit);
      }
    }
    Event::Resize(..) => app.force_full_redraw = true,
    _ =>
    {}
  }
  Ok(Flow::Continue)
}
