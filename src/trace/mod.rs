use std::fs::OpenOptions;
use std::path::PathBuf;

fn enabled() -> bool
{
  std::env::var("LUASTUDIO_TRACE")
    .map(|v| !v.is_empty() && v != "0")
    .unwrap_or(false)
}

/// Append one timestamped line to the trace log when tracing is enabled.
pub fn log<S: AsRef<str>>(s: S)
{
  if !enabled()
  {
    return;
  }
  let line = format!("{} {}\n", now_millis(), s.as_ref());
  if let Some(path) = file_path()
  {
    let _ = OpenOptions::new().create(true).append(true).open(path).and_then(
      |mut f| {
        use std::io::Write;
        f.write_all(line.as_bytes())
      },
    );
  }
}

/// Install a panic hook that logs panic message, location, and backtrace
/// to the trace log and attempts to restore the terminal state so the
/// panic is visible to the user.
pub fn install_panic_hook()
{
  std::panic::set_hook(Box::new(|info| {
    let msg = panic_message(info.payload());
    let loc = info
      .location()
      .map(|l| format!("{}:{}", l.file(), l.line()))
      .unwrap_or_else(|| "<unknown>".to_string());
    let bt = std::backtrace::Backtrace::force_capture();
    log(format!("[panic] {msg} @ {loc}"));
    log(format!("[panic] backtrace:\n{bt}"));
    let _ = crossterm::terminal::disable_raw_mode();
    let mut out = std::io::stdout();
    let _ = crossterm::execute!(out, crossterm::terminal::LeaveAlternateScreen);
    eprintln!("luastudio panicked: {msg} @ {loc}");
  }));
}

/// Render a panic payload (as produced by `catch_unwind` or a panic hook).
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String
{
  if let Some(s) = payload.downcast_ref::<&str>()
  {
    s.to_string()
  }
  else if let Some(s) = payload.downcast_ref::<String>()
  {
    s.clone()
  }
  else
  {
    String::from("<non-string panic payload>")
  }
}

fn file_path() -> Option<PathBuf>
{
  if let Ok(fp) = std::env::var("LUASTUDIO_TRACE_FILE")
  {
    return Some(PathBuf::from(fp));
  }
  if let Ok(tmp) = std::env::var("TMPDIR")
  {
    return Some(PathBuf::from(tmp).join("luastudio-trace.log"));
  }
  Some(PathBuf::from("/tmp/luastudio-trace.log"))
}

fn now_millis() -> u128
{
  use std::time::{
    SystemTime,
    UNIX_EPOCH,
  };
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_millis())
    .unwrap_or(0)
}
