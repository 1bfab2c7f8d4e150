use std::fmt::Write as _;

use ratatui::{
  layout::Rect,
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
    Clear,
    List,
    ListItem,
    ListState,
    Paragraph,
  },
};
use unicode_width::UnicodeWidthStr;

use super::{
  is_focused,
  pane_block,
  truncate_to_width,
};
use crate::{
  app::{
    Focus,
    NodeKind,
  },
  sandbox::MessageKind,
  util::sanitize_line,
};

pub fn draw_explorer(
  f: &mut ratatui::Frame,
  area: Rect,
  app: &crate::App,
)
{
  f.render_widget(Clear, area);
  let focused = is_focused(app, Focus::Explorer);
  let block = pane_block("Explorer", focused);
  let inner = block.inner(area);
  f.render_widget(block, area);

  let active = app.tabs().active();
  let items: Vec<ListItem> = app
    .files()
    .visible_rows()
    .into_iter()
    .map(|row| {
      let marker = match row.kind
      {
        NodeKind::Folder if row.is_open => "▾ ",
        NodeKind::Folder => "▸ ",
        NodeKind::File => "  ",
      };
      let text = format!("{}{}{}", "  ".repeat(row.depth), marker, row.name);
      let mut style = match row.kind
      {
        NodeKind::Folder => Style::default().fg(Color::Blue),
        NodeKind::File => Style::default().fg(Color::Gray),
      };
      if active == Some(row.id.as_str())
      {
        style = style.fg(Color::White).add_modifier(Modifier::BOLD);
      }
      ListItem::new(Line::from(Span::styled(
        truncate_to_width(&text, inner.width as usize),
        style,
      )))
    })
    .collect();

  let mut state = ListState::default();
  if focused
  {
    state.select(Some(app.explorer_selected()));
  }
  let list =
    List::new(items).highlight_style(Style::default().bg(Color::DarkGray));
  f.render_stateful_widget(list, inner, &mut state);
}

pub fn draw_tabs(
  f: &mut ratatui::Frame,
  area: Rect,
  app: &crate::App,
)
{
  let active = app.tabs().active();
  let mut spans = Vec::new();
  for id in app.tabs().open_ids()
  {
    let name = app.files().find(id).map(|n| n.name.as_str()).unwrap_or(id);
    let style = if active == Some(id.as_str())
    {
      Style::default().fg(Color::Black).bg(Color::Cyan)
    }
    else
    {
      Style::default().fg(Color::Gray)
    };
    spans.push(Span::styled(format!(" {} ", name), style));
    spans.push(Span::raw(" "));
  }
  if spans.is_empty()
  {
    spans.push(Span::styled(
      " no open files ",
      Style::default().fg(Color::DarkGray),
    ));
  }
  f.render_widget(Paragraph::new(Line::from(spans)), area);
}

pub fn draw_editor(
  f: &mut ratatui::Frame,
  area: Rect,
  app: &crate::App,
)
{
  f.render_widget(Clear, area);
  let focused = is_focused(app, Focus::Editor);
  let title = app.active_file().map(|n| n.name.clone()).unwrap_or_default();
  let block = pane_block(&title, focused);
  let inner = block.inner(area);
  f.render_widget(block, area);

  let Some(node) = app.active_file()
  else
  {
    let hint = Paragraph::new(Line::from(Span::styled(
      "Select a file in the explorer or press Ctrl-N.",
      Style::default().fg(Color::DarkGray),
    )));
    f.render_widget(hint, inner);
    return;
  };

  let lines: Vec<&str> = node.content.split('\n').collect();
  let gutter = lines.len().to_string().len().max(2);
  let cursor = crate::app::editor::clamp(&node.content, app.cursor());
  let height = inner.height as usize;
  // Keep the cursor line on screen
  let top = if height == 0
  {
    0
  }
  else
  {
    cursor.line.saturating_sub(height - 1)
  };
  let text_w = (inner.width as usize).saturating_sub(gutter + 1);

  let rows: Vec<Line> = lines
    .iter()
    .enumerate()
    .skip(top)
    .take(height)
    .map(|(i, l)| {
      let num_style = if i == cursor.line
      {
        Style::default().fg(Color::Yellow)
      }
      else
      {
        Style::default().fg(Color::DarkGray)
      };
      Line::from(vec![
        Span::styled(format!("{:>w$} ", i + 1, w = gutter), num_style),
        Span::raw(truncate_to_width(&sanitize_line(l), text_w)),
      ])
    })
    .collect();
  f.render_widget(Paragraph::new(rows), inner);

  if focused && height > 0
  {
    let line = lines.get(cursor.line).copied().unwrap_or("");
    let before: String = line.chars().take(cursor.col).collect();
    let col = UnicodeWidthStr::width(sanitize_line(&before).as_str());
    let x = inner.x + (gutter + 1 + col).min((inner.width as usize).saturating_sub(1)) as u16;
    let y = inner.y + (cursor.line - top) as u16;
    f.set_cursor_position((x, y));
  }
}

fn kind_style(kind: MessageKind) -> Style
{
  match kind
  {
    MessageKind::Info => Style::default().fg(Color::Gray),
    MessageKind::Error => Style::default().fg(Color::Red),
    MessageKind::Success => Style::default().fg(Color::Green),
    MessageKind::Input => {
      Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    }
  }
}

pub fn draw_terminal(
  f: &mut ratatui::Frame,
  area: Rect,
  app: &crate::App,
)
{
  f.render_widget(Clear, area);
  let focused = is_focused(app, Focus::Terminal);
  let block = pane_block("Terminal", focused);
  let inner = block.inner(area);
  f.render_widget(block, area);

  let fmt = app.config.ui.date_format.as_str();
  let height = inner.height as usize;
  let messages = app.terminal().messages();
  let start = messages.len().saturating_sub(height);
  let rows: Vec<Line> = messages[start..]
    .iter()
    .map(|m| {
      let mut stamp = String::new();
      if write!(stamp, "{}", m.timestamp.format(fmt)).is_err()
      {
        stamp = m.timestamp.format("%H:%M:%S").to_string();
      }
      let prefix = if m.kind == MessageKind::Input { "$ " } else { "" };
      let body = format!("{}{}", prefix, sanitize_line(&m.text));
      let body_w = (inner.width as usize)
        .saturating_sub(UnicodeWidthStr::width(stamp.as_str()) + 1);
      Line::from(vec![
        Span::styled(stamp, Style::default().fg(Color::DarkGray)),
        Span::raw(" "),
        Span::styled(truncate_to_width(&body, body_w), kind_style(m.kind)),
      ])
    })
    .collect();
  f.render_widget(Paragraph::new(rows), inner);
}
