/// Open editor tabs, in the order they were opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tabs
{
  open:   Vec<String>,
  active: Option<String>,
}

impl Tabs
{
  pub fn new() -> Self
  {
    Self::default()
  }

  pub fn open_ids(&self) -> &[String]
  {
    &self.open
  }

  pub fn active(&self) -> Option<&str>
  {
    self.active.as_deref()
  }

  pub fn is_open(
    &self,
    id: &str,
  ) -> bool
  {
    self.open.iter().any(|o| o == id)
  }

  /// Make `id` active, opening a tab for it if needed.
  pub fn select(
    &mut self,
    id: &str,
  )
  {
    if !self.is_open(id)
    {
      self.open.push(id.to_string());
    }
    self.active = Some(id.to_string());
  }

  /// Close `id`. Closing the active tab activates the last remaining one.
  pub fn close(
    &mut self,
    id: &str,
  )
  {
    self.open.retain(|o| o != id);
    if self.open.is_empty()
    {
      self.active = None;
    }
    else if self.active.as_deref() == Some(id)
    {
      self.active = self.open.last().cloned();
    }
  }

  /// Move the active tab by `delta`, wrapping around.
  pub fn cycle(
    &mut self,
    delta: isize,
  )
  {
    if self.open.is_empty()
    {
      return;
    }
    let len = self.open.len() as isize;
    let cur = self
      .active
      .as_ref()
      .and_then(|a| self.open.iter().position(|o| o == a))
      .unwrap_or(0) as isize;
    let next = (cur + delta).rem_euclid(len) as usize;
    self.active = Some(self.open[next].clone());
  }
}
