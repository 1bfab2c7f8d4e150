//! Error taxonomy and terminal outcome of a sandboxed run.

use std::time::Duration;

/// Every way a run can fail. All variants are terminal for the run and are
/// reported to the host as a single diagnostic line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SandboxError
{
  /// The source did not compile. Nothing was executed.
  #[error("{}", with_line(message, *line))]
  Parse
  {
    message: String,
    line:    Option<u32>,
  },

  /// The script raised an error while running.
  #[error("{}", with_line(message, *line))]
  Runtime
  {
    message: String,
    line:    Option<u32>,
  },

  /// The script ran past its deadline and was aborted.
  #[error("timeout: script exceeded {}ms", .0.as_millis())]
  Timeout(Duration),

  /// The run was cancelled by the host.
  #[error("cancelled")]
  Cancelled,

  /// Anything the engine produced outside of the errors above (panics,
  /// engine misuse, a dead runner).
  #[error("internal fault: {0}")]
  InternalFault(String),
}

fn with_line(
  message: &str,
  line: Option<u32>,
) -> String
{
  match line
  {
    Some(l) => format!("line {l}: {message}"),
    None => message.to_string(),
  }
}

impl SandboxError
{
  pub fn parse<S: Into<String>>(message: S) -> Self
  {
    let (line, message) = split_location(&message.into());
    SandboxError::Parse { message, line }
  }

  pub fn runtime<S: Into<String>>(message: S) -> Self
  {
    let (line, message) = split_location(&strip_traceback(&message.into()));
    SandboxError::Runtime { message, line }
  }

  /// Source line reported by the engine, when there is one.
  pub fn line(&self) -> Option<u32>
  {
    match self
    {
      SandboxError::Parse { line, .. } | SandboxError::Runtime { line, .. } =>
      {
        *line
      }
      _ => None,
    }
  }

  /// True for failures that may have left the Lua state in an unknown shape.
  pub(crate) fn taints_environment(&self) -> bool
  {
    !matches!(self, SandboxError::Parse { .. })
  }
}

/// Terminal classification of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome
{
  Completed,
  ParseFailed(SandboxError),
  RuntimeFailed(SandboxError),
}

impl ExecutionOutcome
{
  pub(crate) fn from_error(err: SandboxError) -> Self
  {
    match err
    {
      e @ SandboxError::Parse { .. } => ExecutionOutcome::ParseFailed(e),
      e => ExecutionOutcome::RuntimeFailed(e),
    }
  }

  pub fn is_completed(&self) -> bool
  {
    matches!(self, ExecutionOutcome::Completed)
  }

  pub fn error(&self) -> Option<&SandboxError>
  {
    match self
    {
      ExecutionOutcome::Completed => None,
      ExecutionOutcome::ParseFailed(e) | ExecutionOutcome::RuntimeFailed(e) =>
      {
        Some(e)
      }
    }
  }

  /// Human readable diagnostic for failed runs.
  pub fn diagnostic(&self) -> Option<String>
  {
    self.error().map(|e| e.to_string())
  }
}

// Lua appends "\nstack traceback:" to errors raised through mlua's message
// handler; the host only wants the first part.
fn strip_traceback(msg: &str) -> String
{
  match msg.find("\nstack traceback:")
  {
    Some(idx) => msg[..idx].trim_end().to_string(),
    None => msg.trim_end().to_string(),
  }
}

/// Split a `chunk:LINE: message` prefix into its line and message parts.
///
/// Lua formats positions as `name:LINE:`, where `name` is the chunk name or
/// `[string "..."]`. Messages without a recognisable position are returned
/// unchanged.
pub(crate) fn split_location(msg: &str) -> (Option<u32>, String)
{
  let bytes = msg.as_bytes();
  let mut i = 0usize;
  while let Some(off) = msg[i..].find(':')
  {
    let start = i + off + 1;
    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_digit()
    {
      end += 1;
    }
    if end > start && end < bytes.len() && bytes[end] == b':'
    {
      if let Ok(line) = msg[start..end].parse::<u32>()
      {
        return (Some(line), msg[end + 1..].trim().to_string());
      }
    }
    i = start;
    if i >= msg.len()
    {
      break;
    }
  }
  (None, msg.trim().to_string())
}
