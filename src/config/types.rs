use crate::runner::RunnerConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Top-level configuration composed from Lua input.
pub struct Config
{
  pub config_version: u32,
  pub runner:         RunnerConfig,
  pub ui:             UiConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Terminal layout knobs.
pub struct UiConfig
{
  /// Explorer column width in cells.
  pub explorer_width:  u16,
  /// Terminal pane height in rows.
  pub terminal_height: u16,
  /// chrono format for terminal timestamps.
  pub date_format:     String,
}

impl Default for UiConfig
{
  fn default() -> Self
  {
    Self {
      explorer_width:  28,
      terminal_height: 10,
      date_format:     String::from("%H:%M:%S"),
    }
  }
}
