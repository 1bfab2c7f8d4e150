use std::{
  fs,
  io::{
    self,
    Write,
  },
  path::Path,
  process::ExitCode,
};

use luastudio::{
  app::App,
  config::{
    self,
    Config,
  },
  runner::{
    RunRequest,
    Runner,
  },
  sandbox::{
    MessageKind,
    ModuleMap,
  },
  trace,
};

fn print_version()
{
  println!("luastudio {}", env!("CARGO_PKG_VERSION"));
}

fn print_help()
{
  println!(
    "Usage: luastudio [OPTIONS]\n\n\
     Options:\n\
       -h, --help            Show this help and exit\n\
       -V, --version         Show version and exit\n\
           --config-dir DIR  Use DIR as the config root (sets LUASTUDIO_CONFIG_DIR)\n\
           --trace[=FILE]    Enable tracing to FILE (default $TMPDIR/luastudio-trace.log)\n\
           --run FILE        Run FILE without the UI; exit status 1 on failure\n"
  );
}

fn load_config() -> io::Result<Config>
{
  let paths = config::discover_config_paths()?;
  config::load_config(&paths)
}

/// Other `.lua` files next to `path`, requirable by stem.
fn sibling_modules(path: &Path) -> ModuleMap
{
  let mut modules = ModuleMap::new();
  let dir = match path.parent()
  {
    Some(d) if !d.as_os_str().is_empty() => d,
    _ => Path::new("."),
  };
  let Ok(entries) = fs::read_dir(dir)
  else
  {
    return modules;
  };
  for entry in entries.flatten()
  {
    let p = entry.path();
    if p.extension().and_then(|e| e.to_str()) != Some("lua")
      || p.file_name() == path.file_name()
    {
      continue;
    }
    if let (Some(stem), Ok(code)) =
      (p.file_stem().and_then(|s| s.to_str()), fs::read_to_string(&p))
    {
      modules.insert(stem.to_string(), code);
    }
  }
  modules
}

fn run_headless(file: &str) -> ExitCode
{
  let path = Path::new(file);
  let source = match fs::read_to_string(path)
  {
    Ok(s) => s,
    Err(e) =>
    {
      eprintln!("luastudio: cannot read '{}': {}", file, e);
      return ExitCode::FAILURE;
    }
  };
  let cfg = match load_config()
  {
    Ok(c) => c,
    Err(e) =>
    {
      eprintln!("luastudio: config error: {}", e);
      return ExitCode::FAILURE;
    }
  };
  let runner = match Runner::new(cfg.runner)
  {
    Ok(r) => r,
    Err(e) =>
    {
      eprintln!("luastudio: cannot start runner: {}", e);
      return ExitCode::FAILURE;
    }
  };
  let name = path
    .file_name()
    .and_then(|n| n.to_str())
    .unwrap_or(file)
    .to_string();
  let request = RunRequest::new(source)
    .with_name(name)
    .with_modules(sibling_modules(path));
  let mut stdout = io::stdout().lock();
  let outcome = runner.run_request(
    request,
    |text, _| {
      let _ = writeln!(stdout, "{}", text);
    },
    |diag| eprintln!("{}", diag),
  );
  if outcome.is_completed() { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

fn main() -> ExitCode
{
  use std::env;
  trace::install_panic_hook();

  // Minimal argument parsing (avoid external deps)
  let mut args = env::args().skip(1);
  let mut run_file: Option<String> = None;
  while let Some(a) = args.next()
  {
    match a.as_str()
    {
      "-h" | "--help" =>
      {
        print_help();
        return ExitCode::SUCCESS;
      }
      "-V" | "--version" =>
      {
        print_version();
        return ExitCode::SUCCESS;
      }
      s if s == "--trace" || s.starts_with("--trace=") =>
      {
        let file = if let Some(eq) = s.split_once('=')
        {
          eq.1.to_string()
        }
        else
        {
          String::new()
        };
        // Enable trace
        unsafe { env::set_var("LUASTUDIO_TRACE", "1") };
        if !file.is_empty()
        {
          unsafe { env::set_var("LUASTUDIO_TRACE_FILE", file) };
        }
      }
      "--config-dir" =>
      {
        if let Some(dir) = args.next()
        {
          unsafe { env::set_var("LUASTUDIO_CONFIG_DIR", &dir) };
        }
        else
        {
          eprintln!("luastudio: --config-dir requires a DIR argument");
          print_help();
          return ExitCode::from(2);
        }
      }
      s if s.starts_with("--config-dir=") =>
      {
        if let Some((_, dir)) = s.split_once('=')
        {
          unsafe { env::set_var("LUASTUDIO_CONFIG_DIR", dir) };
        }
      }
      "--run" =>
      {
        match args.next()
        {
          Some(f) => run_file = Some(f),
          None =>
          {
            eprintln!("luastudio: --run requires a FILE argument");
            print_help();
            return ExitCode::from(2);
          }
        }
      }
      s if s.starts_with("--run=") =>
      {
        if let Some((_, f)) = s.split_once('=')
        {
          run_file = Some(f.to_string());
        }
      }
      other =>
      {
        eprintln!("luastudio: unknown argument: {}", other);
        print_help();
        return ExitCode::from(2);
      }
    }
  }

  if let Some(file) = run_file
  {
    trace::log(format!("[main] headless run of {file}"));
    return run_headless(&file);
  }

  trace::log("[main] starting luastudio");
  let (cfg, cfg_err) = match load_config()
  {
    Ok(c) => (c, None),
    Err(e) => (Config::default(), Some(e)),
  };
  let runner = match Runner::new(cfg.runner.clone())
  {
    Ok(r) => r,
    Err(e) =>
    {
      eprintln!("luastudio: cannot start runner: {}", e);
      return ExitCode::FAILURE;
    }
  };
  let mut app = App::new(cfg);
  if let Some(e) = cfg_err
  {
    trace::log(format!("[config] {e}"));
    app.add_message(format!("config error, using defaults: {e}"), MessageKind::Error);
  }
  if let Err(e) = luastudio::runtime::run_app(&mut app, &runner)
  {
    trace::log(format!("[error] runtime::run_app: {e}"));
    eprintln!("luastudio: {}", e);
    return ExitCode::FAILURE;
  }
  ExitCode::SUCCESS
}
