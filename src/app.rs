//! Core application state, used both by the TUI and integration tests.
//!
//! The [`App`] struct models the editor shell: the project tree, open tabs,
//! the cursor of each open file and the terminal log. The binary owns an
//! instance of `App` plus a [`Runner`]; tests create their own to exercise
//! runs without drawing anything.

pub mod editor;
pub mod files;
pub mod tabs;
pub mod terminal;

use std::{
  cell::RefCell,
  collections::HashMap,
};

pub use editor::Cursor;
pub use files::{
  FileNode,
  FileTree,
  NEW_FILE_CONTENT,
  NodeKind,
  TreeRow,
};
pub use tabs::Tabs;
pub use terminal::TerminalLog;

use crate::{
  config::Config,
  runner::{
    RunEvent,
    RunHandle,
    RunRequest,
    Runner,
  },
  sandbox::{
    ExecutionOutcome,
    MessageKind,
  },
};

/// Most run events moved into the log per [`App::poll_run`] call, so a
/// flooding script cannot starve key handling.
pub const POLL_BATCH: usize = 256;

/// Pane that receives key input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus
{
  Explorer,
  Editor,
  Terminal,
}

impl Focus
{
  pub fn next(self) -> Self
  {
    match self
    {
      Focus::Explorer => Focus::Editor,
      Focus::Editor => Focus::Terminal,
      Focus::Terminal => Focus::Explorer,
    }
  }
}

/// The "new file" name prompt.
#[derive(Debug, Clone)]
pub struct PromptState
{
  pub parent: String,
  pub input:  String,
}

struct ActiveRun
{
  name:   String,
  handle: RunHandle,
}

/// Mutable application state driving the editor shell.
pub struct App
{
  pub(crate) config:            Config,
  pub(crate) files:             FileTree,
  pub(crate) tabs:              Tabs,
  pub(crate) terminal:          TerminalLog,
  pub(crate) cursors:           HashMap<String, Cursor>,
  pub(crate) focus:             Focus,
  pub(crate) explorer_selected: usize,
  pub(crate) prompt:            Option<PromptState>,
  pub(crate) force_full_redraw: bool,
  active_run:                   Option<ActiveRun>,
}

impl App
{
  /// Open the sample project with `main.lua` active.
  pub fn new(config: Config) -> Self
  {
    let mut app = Self {
      config,
      files: FileTree::sample(),
      tabs: Tabs::new(),
      terminal: TerminalLog::new(),
      cursors: HashMap::new(),
      focus: Focus::Editor,
      explorer_selected: 0,
      prompt: None,
      force_full_redraw: false,
      active_run: None,
    };
    app.select_file("main.lua");
    app
  }

  pub fn config(&self) -> &Config
  {
    &self.config
  }

  pub fn files(&self) -> &FileTree
  {
    &self.files
  }

  pub fn tabs(&self) -> &Tabs
  {
    &self.tabs
  }

  pub fn terminal(&self) -> &TerminalLog
  {
    &self.terminal
  }

  pub fn focus(&self) -> Focus
  {
    self.focus
  }

  pub fn set_focus(
    &mut self,
    focus: Focus,
  )
  {
    self.focus = focus;
  }

  pub fn cycle_focus(&mut self)
  {
    self.focus = self.focus.next();
  }

  pub fn prompt(&self) -> Option<&PromptState>
  {
    self.prompt.as_ref()
  }

  /// The node behind the active tab.
  pub fn active_file(&self) -> Option<&FileNode>
  {
    self.tabs.active().and_then(|id| self.files.find(id))
  }

  pub fn cursor(&self) -> Cursor
  {
    self
      .tabs
      .active()
      .and_then(|id| self.cursors.get(id).copied())
      .unwrap_or_default()
  }

  // ---- tree and tabs ----

  /// Open a file in a tab, or toggle a folder.
  pub fn select_file(
    &mut self,
    id: &str,
  ) -> bool
  {
    let Some(node) = self.files.find(id)
    else
    {
      return false;
    };
    if node.is_file()
    {
      self.tabs.select(id);
      self.cursors.entry(id.to_string()).or_default();
    }
    else
    {
      self.files.toggle_folder(id);
      self.clamp_explorer();
    }
    true
  }

  pub fn close_tab(
    &mut self,
    id: &str,
  )
  {
    self.tabs.close(id);
    self.cursors.remove(id);
  }

  pub fn close_active_tab(&mut self)
  {
    if let Some(id) = self.tabs.active().map(str::to_string)
    {
      self.close_tab(&id);
    }
  }

  pub fn cycle_tab(
    &mut self,
    delta: isize,
  )
  {
    self.tabs.cycle(delta);
  }

  pub fn explorer_selected(&self) -> usize
  {
    self.explorer_selected
  }

  pub fn explorer_move(
    &mut self,
    delta: isize,
  )
  {
    let len = self.files.visible_rows().len();
    if len == 0
    {
      self.explorer_selected = 0;
      return;
    }
    let next = self.explorer_selected as isize + delta;
    self.explorer_selected = next.clamp(0, len as isize - 1) as usize;
  }

  /// Act on the highlighted explorer row.
  pub fn explorer_activate(&mut self)
  {
    let rows = self.files.visible_rows();
    if let Some(row) = rows.get(self.explorer_selected)
    {
      let id = row.id.clone();
      let is_file = row.kind == NodeKind::File;
      self.select_file(&id);
      if is_file
      {
        self.focus = Focus::Editor;
      }
    }
  }

  fn clamp_explorer(&mut self)
  {
    let len = self.files.visible_rows().len();
    self.explorer_selected = self.explorer_selected.min(len.saturating_sub(1));
  }

  /// Folder a new file would land in: the highlighted folder, the folder of
  /// the highlighted file, or the first top-level folder.
  fn target_folder(&self) -> Option<String>
  {
    let rows = self.files.visible_rows();
    if self.focus == Focus::Explorer
      && let Some(row) = rows.get(self.explorer_selected)
    {
      if row.kind == NodeKind::Folder
      {
        return Some(row.id.clone());
      }
      if let Some(parent) = self.files.parent_of(&row.id)
      {
        return Some(parent.to_string());
      }
    }
    if let Some(active) = self.tabs.active()
      && let Some(parent) = self.files.parent_of(active)
    {
      return Some(parent.to_string());
    }
    self
      .files
      .roots()
      .iter()
      .find(|n| n.kind == NodeKind::Folder)
      .map(|n| n.id.clone())
  }

  pub fn begin_new_file(&mut self)
  {
    match self.target_folder()
    {
      Some(parent) =>
      {
        self.prompt = Some(PromptState { parent, input: String::new() })
      }
      None => self.terminal.add("No folder to create a file in.", MessageKind::Error),
    }
  }

  pub fn cancel_prompt(&mut self)
  {
    self.prompt = None;
  }

  pub fn prompt_input(
    &mut self,
    ch: char,
  )
  {
    if let Some(p) = self.prompt.as_mut()
    {
      p.input.push(ch);
    }
  }

  pub fn prompt_backspace(&mut self)
  {
    if let Some(p) = self.prompt.as_mut()
    {
      p.input.pop();
    }
  }

  /// Create the file named in the prompt and open it.
  pub fn submit_prompt(&mut self) -> Option<String>
  {
    let p = self.prompt.take()?;
    self.create_file(&p.parent, &p.input)
  }

  /// Create `name` under folder `parent` with the starter content and open it.
  pub fn create_file(
    &mut self,
    parent: &str,
    name: &str,
  ) -> Option<String>
  {
    match self.files.create_file(parent, name, NEW_FILE_CONTENT)
    {
      Some(id) =>
      {
        crate::trace::log(format!("[app] created {id} under {parent}"));
        self.select_file(&id);
        self.focus = Focus::Editor;
        Some(id)
      }
      None =>
      {
        self
          .terminal
          .add(format!("Cannot create file '{}'.", name.trim()), MessageKind::Error);
        None
      }
    }
  }

  pub fn update_content(
    &mut self,
    id: &str,
    content: String,
  ) -> bool
  {
    self.files.update_content(id, content)
  }

  // ---- editing ----

  fn edit_active<F>(
    &mut self,
    f: F,
  ) where
    F: FnOnce(&mut String, &mut Cursor),
  {
    let Some(id) = self.tabs.active().map(str::to_string)
    else
    {
      return;
    };
    let mut cursor = self.cursors.get(&id).copied().unwrap_or_default();
    if let Some(node) = self.files.find_mut(&id)
      && node.is_file()
    {
      f(&mut node.content, &mut cursor);
      self.cursors.insert(id, cursor);
    }
  }

  pub fn insert_char(
    &mut self,
    ch: char,
  )
  {
    self.edit_active(|text, cursor| editor::insert_char(text, cursor, ch));
  }

  pub fn backspace(&mut self)
  {
    self.edit_active(editor::backspace);
  }

  pub fn delete(&mut self)
  {
    self.edit_active(editor::delete);
  }

  pub fn move_cursor(
    &mut self,
    dline: isize,
    dcol: isize,
  )
  {
    self.edit_active(|text, cursor| editor::move_by(text, cursor, dline, dcol));
  }

  pub fn cursor_home(&mut self)
  {
    self.edit_active(|_, cursor| editor::home(cursor));
  }

  pub fn cursor_end(&mut self)
  {
    self.edit_active(|text, cursor| editor::end(text, cursor));
  }

  // ---- terminal and runs ----

  pub fn clear_terminal(&mut self)
  {
    self.terminal.clear();
  }

  pub fn add_message<S: Into<String>>(
    &mut self,
    text: S,
    kind: MessageKind,
  )
  {
    self.terminal.add(text, kind);
  }

  pub fn is_running(&self) -> bool
  {
    self.active_run.is_some()
  }

  /// Validate the active tab and echo the command line.
  fn prepare_run(&mut self) -> Option<(String, RunRequest)>
  {
    let Some(node) = self.active_file().filter(|n| n.is_file())
    else
    {
      self.terminal.add("No file selected or invalid file.", MessageKind::Error);
      return None;
    };
    let name = node.name.clone();
    let request = RunRequest::new(node.content.clone())
      .with_name(name.clone())
      .with_modules(self.files.lua_modules(&node.id));
    self.terminal.add(format!("lua {name}"), MessageKind::Input);
    Some((name, request))
  }

  fn finish_run(
    &mut self,
    name: &str,
    outcome: &ExecutionOutcome,
  )
  {
    if outcome.is_completed()
    {
      self.terminal.add(format!("{name} finished"), MessageKind::Success);
    }
  }

  /// Run the active file and wait for it.
  ///
  /// Returns `None` when there is nothing runnable; the reason is already in
  /// the terminal log.
  pub fn run_active(
    &mut self,
    runner: &Runner,
  ) -> Option<ExecutionOutcome>
  {
    if self.active_run.is_some()
    {
      self.terminal.add("A script is already running.", MessageKind::Error);
      return None;
    }
    let (name, request) = self.prepare_run()?;
    let log = RefCell::new(&mut self.terminal);
    let outcome = runner.run_request(
      request,
      |text, kind| log.borrow_mut().add(text, kind),
      |diag| log.borrow_mut().add(diag, MessageKind::Error),
    );
    self.finish_run(&name, &outcome);
    Some(outcome)
  }

  /// Start the active file without blocking; drive it with
  /// [`poll_run`](Self::poll_run).
  pub fn start_run(
    &mut self,
    runner: &Runner,
  ) -> bool
  {
    if self.active_run.is_some()
    {
      return false;
    }
    let Some((name, request)) = self.prepare_run()
    else
    {
      return false;
    };
    let handle = runner.submit(request);
    self.active_run = Some(ActiveRun { name, handle });
    true
  }

  /// Move up to [`POLL_BATCH`] events of the current run into the terminal
  /// log. Returns true when something was appended.
  pub fn poll_run(&mut self) -> bool
  {
    let Some(mut run) = self.active_run.take()
    else
    {
      return false;
    };
    let mut changed = false;
    let mut outcome = None;
    for _ in 0..POLL_BATCH
    {
      let Some(ev) = run.handle.try_next()
      else
      {
        break;
      };
      changed = true;
      match ev
      {
        RunEvent::Output(m) => self.terminal.push(m),
        RunEvent::Finished(o) =>
        {
          if let Some(diag) = o.diagnostic()
          {
            self.terminal.add(diag, MessageKind::Error);
          }
          outcome = Some(o);
        }
      }
    }
    match outcome
    {
      Some(o) => self.finish_run(&run.name, &o),
      None => self.active_run = Some(run),
    }
    changed
  }

  /// Cancel the run started with [`start_run`](Self::start_run).
  pub fn cancel_run(&mut self)
  {
    if let Some(run) = self.active_run.as_ref()
    {
      run.handle.cancel();
    }
  }
}
