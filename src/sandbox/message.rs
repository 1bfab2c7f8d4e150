use chrono::{
  DateTime,
  Local,
};

/// Classification of a terminal line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind
{
  Info,
  Error,
  Success,
  Input,
}

impl MessageKind
{
  pub fn as_str(self) -> &'static str
  {
    match self
    {
      MessageKind::Info => "info",
      MessageKind::Error => "error",
      MessageKind::Success => "success",
      MessageKind::Input => "input",
    }
  }
}

/// One unit of text emitted during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputMessage
{
  pub text:      String,
  pub kind:      MessageKind,
  pub timestamp: DateTime<Local>,
}

impl OutputMessage
{
  pub fn new<S: Into<String>>(
    text: S,
    kind: MessageKind,
  ) -> Self
  {
    Self { text: text.into(), kind, timestamp: Local::now() }
  }

  pub fn info<S: Into<String>>(text: S) -> Self
  {
    Self::new(text, MessageKind::Info)
  }

  pub fn error<S: Into<String>>(text: S) -> Self
  {
    Self::new(text, MessageKind::Error)
  }
}
