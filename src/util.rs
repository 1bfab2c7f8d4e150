//! Small utility helpers shared across the codebase.

/// Expand tabs, strip carriage returns, and replace control characters with
/// spaces.
pub fn sanitize_line(s: &str) -> String
{
  let mut out = String::with_capacity(s.len());
  for ch in s.chars()
  {
    match ch
    {
      '\t' => out.push_str("    "),
      '\r' =>
      {}
      c if c.is_control() => out.push(' '),
      c => out.push(c),
    }
  }
  out
}

#[cfg(test)]
mod tests
{
  use super::sanitize_line;

  #[test]
  fn control_characters_become_spaces()
  {
    assert_eq!(sanitize_line("a\tb\r\x07c"), "a    b c");
  }
}
