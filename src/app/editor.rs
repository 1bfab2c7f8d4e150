//! Cursor-based editing of a file's text.
//!
//! Positions are (line, column) in characters; the text itself stays a plain
//! `String` owned by the file tree.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor
{
  pub line: usize,
  pub col:  usize,
}

fn line_count(text: &str) -> usize
{
  text.split('\n').count()
}

fn line_len(
  text: &str,
  line: usize,
) -> usize
{
  text.split('\n').nth(line).map(|l| l.chars().count()).unwrap_or(0)
}

/// Keep the cursor inside the text.
pub fn clamp(
  text: &str,
  cursor: Cursor,
) -> Cursor
{
  let line = cursor.line.min(line_count(text).saturating_sub(1));
  let col = cursor.col.min(line_len(text, line));
  Cursor { line, col }
}

/// Byte offset of `cursor` within `text`.
fn offset(
  text: &str,
  cursor: Cursor,
) -> usize
{
  let cursor = clamp(text, cursor);
  let mut off = 0usize;
  for (i, l) in text.split('\n').enumerate()
  {
    if i == cursor.line
    {
      return off
        + l.char_indices().nth(cursor.col).map(|(b, _)| b).unwrap_or(l.len());
    }
    off += l.len() + 1;
  }
  text.len()
}

pub fn insert_char(
  text: &mut String,
  cursor: &mut Cursor,
  ch: char,
)
{
  let c = clamp(text, *cursor);
  text.insert(offset(text, c), ch);
  *cursor = if ch == '\n'
  {
    Cursor { line: c.line + 1, col: 0 }
  }
  else
  {
    Cursor { line: c.line, col: c.col + 1 }
  };
}

pub fn backspace(
  text: &mut String,
  cursor: &mut Cursor,
)
{
  let c = clamp(text, *cursor);
  if c.col == 0 && c.line == 0
  {
    *cursor = c;
    return;
  }
  let at = offset(text, c);
  let prev = text[..at].chars().next_back().map(|ch| ch.len_utf8()).unwrap_or(0);
  let new_cursor = if c.col == 0
  {
    Cursor { line: c.line - 1, col: line_len(text, c.line - 1) }
  }
  else
  {
    Cursor { line: c.line, col: c.col - 1 }
  };
  text.replace_range(at - prev..at, "");
  *cursor = new_cursor;
}

pub fn delete(
  text: &mut String,
  cursor: &mut Cursor,
)
{
  let c = clamp(text, *cursor);
  let at = offset(text, c);
  if let Some(ch) = text[at..].chars().next()
  {
    text.replace_range(at..at + ch.len_utf8(), "");
  }
  *cursor = c;
}

pub fn move_by(
  text: &str,
  cursor: &mut Cursor,
  dline: isize,
  dcol: isize,
)
{
  let c = clamp(text, *cursor);
  if dline != 0
  {
    let last = line_count(text).saturating_sub(1) as isize;
    let line = (c.line as isize + dline).clamp(0, last) as usize;
    *cursor = clamp(text, Cursor { line, col: cursor.col });
    return;
  }
  if dcol < 0
  {
    *cursor = if c.col > 0
    {
      Cursor { line: c.line, col: c.col - 1 }
    }
    else if c.line > 0
    {
      Cursor { line: c.line - 1, col: line_len(text, c.line - 1) }
    }
    else
    {
      c
    };
  }
  else if dcol > 0
  {
    *cursor = if c.col < line_len(text, c.line)
    {
      Cursor { line: c.line, col: c.col + 1 }
    }
    else if c.line + 1 < line_count(text)
    {
      Cursor { line: c.line + 1, col: 0 }
    }
    else
    {
      c
    };
  }
}

pub fn home(cursor: &mut Cursor)
{
  cursor.col = 0;
}

pub fn end(
  text: &str,
  cursor: &mut Cursor,
)
{
  cursor.col = line_len(text, clamp(text, *cursor).line);
}
