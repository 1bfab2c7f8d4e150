use std::{
  env,
  fs,
  path::{
    Path,
    PathBuf,
  },
};

/// Resolved configuration locations for luastudio.
#[derive(Debug, Clone)]
pub struct ConfigPaths
{
  pub root:   PathBuf,
  pub entry:  PathBuf,
  pub exists: bool,
}

/// Discover the effective configuration directory and entry point.
///
/// Checks `LUASTUDIO_CONFIG_DIR`, then `XDG_CONFIG_HOME/luastudio`.
///
/// Platform-specific fallbacks:
/// - Unix: `~/.config/luastudio`
/// - Windows: `%APPDATA%\\luastudio`, then `%USERPROFILE%\\.config\\luastudio`
///
/// The returned struct includes the root directory, the path to `init.lua`, and
/// whether the file currently exists.
pub fn discover_config_paths() -> std::io::Result<ConfigPaths>
{
  fn non_empty(var: &str) -> Option<String>
  {
    env::var(var).ok().filter(|v| !v.trim().is_empty())
  }

  let root = if let Some(over) = non_empty("LUASTUDIO_CONFIG_DIR")
  {
    PathBuf::from(over)
  }
  else if let Some(xdg) = non_empty("XDG_CONFIG_HOME")
  {
    Path::new(&xdg).join("luastudio")
  }
  else
  {
    #[cfg(windows)]
    {
      if let Some(app) = non_empty("APPDATA")
      {
        Path::new(&app).join("luastudio")
      }
      else if let Some(up) = non_empty("USERPROFILE")
      {
        Path::new(&up).join(".config").join("luastudio")
      }
      else
      {
        Path::new(".config").join("luastudio")
      }
    }
    #[cfg(not(windows))]
    {
      if let Some(home) = non_empty("HOME")
      {
        Path::new(&home).join(".config").join("luastudio")
      }
      else
      {
        Path::new(".config").join("luastudio")
      }
    }
  };

  let entry = root.join("init.lua");
  let exists = fs::metadata(&entry).map(|m| m.is_file()).unwrap_or(false);
  Ok(ConfigPaths { root, entry, exists })
}
