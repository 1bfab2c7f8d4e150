//! Input handling for keyboard events.

use crate::{
  app::{
    App,
    Focus,
  },
  runner::Runner,
};
use std::io;

use crossterm::event::{
  KeyCode,
  KeyEvent,
  KeyEventKind,
  KeyModifiers,
};

/// Accept a terminal key event and mutate the [`App`] accordingly.
///
/// Returns `Ok(true)` when the caller should exit. Global chords are checked
/// first; everything else goes to the prompt when it is open, otherwise to
/// the focused pane.
pub fn handle_key(
  app: &mut App,
  runner: &Runner,
  key: KeyEvent,
) -> io::Result<bool>
{
  // Ignore key release/repeat events to avoid double-processing (esp. on
  // Windows)
  if key.kind != KeyEventKind::Press
  {
    return Ok(false);
  }

  let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
  match key.code
  {
    KeyCode::Char('q') if ctrl =>
    {
      app.cancel_run();
      return Ok(true);
    }
    KeyCode::F(5) =>
    {
      app.start_run(runner);
      return Ok(false);
    }
    KeyCode::Char('r') if ctrl =>
    {
      app.start_run(runner);
      return Ok(false);
    }
    KeyCode::Char('c') if ctrl =>
    {
      if app.is_running()
      {
        app.cancel_run();
      }
      return Ok(false);
    }
    _ =>
    {}
  }

  if app.prompt().is_some()
  {
    handle_prompt_key(app, key);
    return Ok(false);
  }

  match key.code
  {
    KeyCode::Char('n') if ctrl =>
    {
      app.begin_new_file();
      return Ok(false);
    }
    KeyCode::Char('w') if ctrl =>
    {
      app.close_active_tab();
      return Ok(false);
    }
    KeyCode::Char('l') if ctrl =>
    {
      app.clear_terminal();
      return Ok(false);
    }
    KeyCode::PageDown if ctrl =>
    {
      app.cycle_tab(1);
      return Ok(false);
    }
    KeyCode::PageUp if ctrl =>
    {
      app.cycle_tab(-1);
      return Ok(false);
    }
    KeyCode::Tab =>
    {
      app.cycle_focus();
      return Ok(false);
    }
    _ =>
    {}
  }

  match app.focus()
  {
    Focus::Explorer => handle_explorer_key(app, key),
    Focus::Editor => handle_editor_key(app, key),
    Focus::Terminal =>
    {}
  }
  Ok(false)
}

fn handle_prompt_key(
  app: &mut App,
  key: KeyEvent,
)
{
  match key.code
  {
    KeyCode::Esc => app.cancel_prompt(),
    KeyCode::Enter =>
    {
      app.submit_prompt();
    }
    KeyCode::Backspace => app.prompt_backspace(),
    KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) =>
    {
      app.prompt_input(ch)
    }
    _ =>
    {}
  }
}

fn handle_explorer_key(
  app: &mut App,
  key: KeyEvent,
)
{
  match key.code
  {
    KeyCode::Up | KeyCode::Char('k') => app.explorer_move(-1),
    KeyCode::Down | KeyCode::Char('j') => app.explorer_move(1),
    KeyCode::Enter | KeyCode::Char(' ') => app.explorer_activate(),
    _ =>
    {}
  }
}

fn handle_editor_key(
  app: &mut App,
  key: KeyEvent,
)
{
  let blocked = key.modifiers.contains(KeyModifiers::CONTROL)
    || key.modifiers.contains(KeyModifiers::ALT);
  match key.code
  {
    KeyCode::Char(ch) if !blocked => app.insert_char(ch),
    KeyCode::Enter => app.insert_char('\n'),
    KeyCode::Backspace => app.backspace(),
    KeyCode::Delete => app.delete(),
    KeyCode::Left => app.move_cursor(0, -1),
    KeyCode::Right => app.move_cursor(0, 1),
    KeyCode::Up => app.move_cursor(-1, 0),
    KeyCode::Down => app.move_cursor(1, 0),
    KeyCode::Home => app.cursor_home(),
    KeyCode::End => app.cursor_end(),
    _ =>
    {}
  }
}
