use crate::sandbox::{
  MessageKind,
  OutputMessage,
};

/// Lines kept before the oldest are dropped.
pub const SCROLLBACK: usize = 2000;

/// Terminal pane history. Owned by the host; the sandbox never reads it.
#[derive(Debug, Clone, Default)]
pub struct TerminalLog
{
  messages: Vec<OutputMessage>,
}

impl TerminalLog
{
  pub fn new() -> Self
  {
    Self::default()
  }

  pub fn messages(&self) -> &[OutputMessage]
  {
    &self.messages
  }

  pub fn push(
    &mut self,
    message: OutputMessage,
  )
  {
    self.messages.push(message);
    if self.messages.len() > SCROLLBACK
    {
      let excess = self.messages.len() - SCROLLBACK;
      self.messages.drain(..excess);
    }
  }

  pub fn add<S: Into<String>>(
    &mut self,
    text: S,
    kind: MessageKind,
  )
  {
    self.push(OutputMessage::new(text, kind));
  }

  pub fn clear(&mut self)
  {
    self.messages.clear();
  }
}

#[cfg(test)]
mod tests
{
  use super::*;

  #[test]
  fn scrollback_drops_oldest()
  {
    let mut log = TerminalLog::new();
    for i in 0..SCROLLBACK + 5
    {
      log.add(i.to_string(), MessageKind::Info);
    }
    assert_eq!(log.messages().len(), SCROLLBACK);
    assert_eq!(log.messages()[0].text, "5");
  }
}
