pub mod panes;

use ratatui::{
  layout::{
    Alignment,
    Constraint,
    Direction,
    Layout,
    Rect,
  },
  style::{
    Color,
    Modifier,
    Style,
  },
  text::{
    Line,
    Span,
  },
  widgets::{
    Block,
    Borders,
    Clear,
    Paragraph,
  },
};
use unicode_width::UnicodeWidthStr;

use crate::app::Focus;

pub fn draw(
  f: &mut ratatui::Frame,
  app: &crate::App,
)
{
  // Header row, then body, then the terminal pane at the bottom
  let full = f.area();
  let term_h = app.config.ui.terminal_height.min(full.height.saturating_sub(4));
  let vchunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1),
      Constraint::Min(3),
      Constraint::Length(term_h),
    ])
    .split(full);

  draw_header(f, vchunks[0], app);

  let explorer_w = app.config.ui.explorer_width.min(vchunks[1].width / 2);
  let hchunks = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Length(explorer_w), Constraint::Min(10)])
    .split(vchunks[1]);

  panes::draw_explorer(f, hchunks[0], app);

  let editor_chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([Constraint::Length(1), Constraint::Min(1)])
    .split(hchunks[1]);
  panes::draw_tabs(f, editor_chunks[0], app);
  panes::draw_editor(f, editor_chunks[1], app);
  panes::draw_terminal(f, vchunks[2], app);

  if app.prompt().is_some()
  {
    draw_prompt(f, full, app);
  }
}

fn draw_header(
  f: &mut ratatui::Frame,
  area: Rect,
  app: &crate::App,
)
{
  // Left: {user}@{host}  active file
  let user = whoami::username();
  let host = whoami::fallible::hostname().unwrap_or_default();
  let active = app.active_file().map(|n| n.name.as_str()).unwrap_or("-");
  let left_full = format!("{}@{}  {}", user, host, active);

  // Right: run state and the main keys
  let state = if app.is_running() { "running" } else { "idle" };
  let right_full = format!("{}  F5 run  ^N new  ^Q quit", state);

  let total = area.width as usize;
  let right_w = UnicodeWidthStr::width(right_full.as_str());
  let left_max = total.saturating_sub(right_w + 1);
  let left = truncate_to_width(&left_full, left_max);

  let style = Style::default().fg(Color::Gray);
  let right_style = if app.is_running()
  {
    style.fg(Color::Yellow).add_modifier(Modifier::BOLD)
  }
  else
  {
    style
  };
  let left_p = Paragraph::new(left).alignment(Alignment::Left).style(style);
  let right_p =
    Paragraph::new(right_full).alignment(Alignment::Right).style(right_style);
  f.render_widget(left_p, area);
  f.render_widget(right_p, area);
}

fn draw_prompt(
  f: &mut ratatui::Frame,
  area: Rect,
  app: &crate::App,
)
{
  let Some(state) = app.prompt()
  else
  {
    return;
  };
  let width = 50.min(area.width);
  let height = 4.min(area.height);
  let popup = Rect::new(
    area.x + area.width.saturating_sub(width) / 2,
    area.y + area.height.saturating_sub(height) / 2,
    width,
    height,
  );
  f.render_widget(Clear, popup);

  let title_style = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
  let block = Block::default()
    .borders(Borders::ALL)
    .title(Span::styled(format!(" New file in {} ", state.parent), title_style));
  let inner = block.inner(popup);
  f.render_widget(block, popup);
  let lines = vec![
    Line::from(Span::raw(state.input.clone())),
    Line::from(Span::styled(
      "Enter create  Esc cancel",
      Style::default().fg(Color::DarkGray),
    )),
  ];
  f.render_widget(Paragraph::new(lines), inner);
  let cx = inner.x
    + (UnicodeWidthStr::width(state.input.as_str()) as u16)
      .min(inner.width.saturating_sub(1));
  f.set_cursor_position((cx, inner.y));
}

/// Border style for a pane, highlighted when it has focus.
pub(crate) fn pane_block(
  title: &str,
  focused: bool,
) -> Block<'static>
{
  let border = if focused
  {
    Style::default().fg(Color::Cyan)
  }
  else
  {
    Style::default().fg(Color::DarkGray)
  };
  Block::default()
    .borders(Borders::ALL)
    .border_style(border)
    .title(Span::styled(format!(" {} ", title), Style::default().fg(Color::Gray)))
}

pub(crate) fn is_focused(
  app: &crate::App,
  pane: Focus,
) -> bool
{
  app.focus() == pane && app.prompt().is_none()
}

pub fn truncate_to_width(
  s: &str,
  max_w: usize,
) -> String
{
  if max_w == 0
  {
    return String::new();
  }
  let mut out = String::new();
  let mut w = 0usize;
  for ch in s.chars()
  {
    let cw = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
    if w + cw > max_w
    {
      break;
    }
    out.push(ch);
    w += cw;
  }
  out
}

#[cfg(test)]
mod tests
{
  use super::truncate_to_width;

  #[test]
  fn truncate_counts_display_cells()
  {
    assert_eq!(truncate_to_width("hello", 3), "hel");
    assert_eq!(truncate_to_width("日本語", 5), "日本");
    assert_eq!(truncate_to_width("abc", 0), "");
  }
}
