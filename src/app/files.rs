//! In-memory project tree shown in the explorer.

use crate::sandbox::ModuleMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind
{
  File,
  Folder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode
{
  pub id:       String,
  pub name:     String,
  pub kind:     NodeKind,
  pub content:  String,
  pub children: Vec<FileNode>,
  pub is_open:  bool,
}

impl FileNode
{
  pub fn file<I: Into<String>, N: Into<String>, C: Into<String>>(
    id: I,
    name: N,
    content: C,
  ) -> Self
  {
    Self {
      id:       id.into(),
      name:     name.into(),
      kind:     NodeKind::File,
      content:  content.into(),
      children: Vec::new(),
      is_open:  false,
    }
  }

  pub fn folder<I: Into<String>, N: Into<String>>(
    id: I,
    name: N,
    children: Vec<FileNode>,
  ) -> Self
  {
    Self {
      id:       id.into(),
      name:     name.into(),
      kind:     NodeKind::Folder,
      content:  String::new(),
      children,
      is_open:  true,
    }
  }

  pub fn is_file(&self) -> bool
  {
    self.kind == NodeKind::File
  }

  pub fn is_lua(&self) -> bool
  {
    self.is_file() && self.name.ends_with(".lua")
  }
}

/// One visible line of the explorer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow
{
  pub id:      String,
  pub name:    String,
  pub depth:   usize,
  pub kind:    NodeKind,
  pub is_open: bool,
}

const SAMPLE_MAIN: &str = r#"local math = require("math")

-- Main calculation module
local function calculate_sum(a, b)
  return a + b
end

local x = 10
local y = 20

print("Starting summation script...")
local result = calculate_sum(x, y)
print("Result: " .. result)

-- Validation block
if result > 25 then
  print("Condition met: Value exceeds 25")
end"#;

const SAMPLE_UTILS: &str = "-- Utility functions\nlocal function greet(name)\n  print(\"Hello, \" .. name)\nend\n\nreturn { greet = greet }";

const SAMPLE_CONFIG: &str = "{\n  \"version\": \"1.0.0\",\n  \"debug\": true\n}";

pub const NEW_FILE_CONTENT: &str = "-- Start coding here...";

#[derive(Debug, Clone, Default)]
pub struct FileTree
{
  roots:   Vec<FileNode>,
  next_id: u64,
}

impl FileTree
{
  pub fn new(roots: Vec<FileNode>) -> Self
  {
    Self { roots, next_id: 1 }
  }

  /// The starter project every new workspace opens with.
  pub fn sample() -> Self
  {
    Self::new(vec![FileNode::folder("root", "PROJECT-LUA", vec![
      FileNode::folder("src", "src", vec![
        FileNode::file("main.lua", "main.lua", SAMPLE_MAIN),
        FileNode::file("utils.lua", "utils.lua", SAMPLE_UTILS),
      ]),
      FileNode::file("config.json", "config.json", SAMPLE_CONFIG),
    ])])
  }

  pub fn roots(&self) -> &[FileNode]
  {
    &self.roots
  }

  pub fn find(
    &self,
    id: &str,
  ) -> Option<&FileNode>
  {
    fn walk<'a>(
      nodes: &'a [FileNode],
      id: &str,
    ) -> Option<&'a FileNode>
    {
      for node in nodes
      {
        if node.id == id
        {
          return Some(node);
        }
        if let Some(found) = walk(&node.children, id)
        {
          return Some(found);
        }
      }
      None
    }
    walk(&self.roots, id)
  }

  pub fn find_mut(
    &mut self,
    id: &str,
  ) -> Option<&mut FileNode>
  {
    fn walk<'a>(
      nodes: &'a mut [FileNode],
      id: &str,
    ) -> Option<&'a mut FileNode>
    {
      for node in nodes
      {
        if node.id == id
        {
          return Some(node);
        }
        if let Some(found) = walk(&mut node.children, id)
        {
          return Some(found);
        }
      }
      None
    }
    walk(&mut self.roots, id)
  }

  /// Replace the content of file `id`. Folders are left alone.
  pub fn update_content(
    &mut self,
    id: &str,
    content: String,
  ) -> bool
  {
    match self.find_mut(id)
    {
      Some(node) if node.is_file() =>
      {
        node.content = content;
        true
      }
      _ => false,
    }
  }

  pub fn toggle_folder(
    &mut self,
    id: &str,
  ) -> bool
  {
    match self.find_mut(id)
    {
      Some(node) if node.kind == NodeKind::Folder =>
      {
        node.is_open = !node.is_open;
        true
      }
      _ => false,
    }
  }

  /// Add a file named `name` under folder `parent_id` and open the folder.
  ///
  /// Returns the new id, or `None` when the name is empty, contains a path
  /// separator, is already taken in that folder, or the parent is not a
  /// folder.
  pub fn create_file(
    &mut self,
    parent_id: &str,
    name: &str,
    content: &str,
  ) -> Option<String>
  {
    let name = name.trim();
    if name.is_empty() || name.contains('/') || name.contains('\\')
    {
      return None;
    }
    let id = format!("{}_{}", name, self.next_id);
    let parent = self.find_mut(parent_id)?;
    if parent.kind != NodeKind::Folder
      || parent.children.iter().any(|c| c.name == name)
    {
      return None;
    }
    parent.is_open = true;
    parent.children.push(FileNode::file(id.clone(), name, content));
    self.next_id += 1;
    Some(id)
  }

  /// Flatten the open part of the tree in display order.
  pub fn visible_rows(&self) -> Vec<TreeRow>
  {
    fn walk(
      nodes: &[FileNode],
      depth: usize,
      out: &mut Vec<TreeRow>,
    )
    {
      for node in nodes
      {
        out.push(TreeRow {
          id: node.id.clone(),
          name: node.name.clone(),
          depth,
          kind: node.kind,
          is_open: node.is_open,
        });
        if node.kind == NodeKind::Folder && node.is_open
        {
          walk(&node.children, depth + 1, out);
        }
      }
    }
    let mut out = Vec::new();
    walk(&self.roots, 0, &mut out);
    out
  }

  /// Id of the folder holding `id`, if any.
  pub fn parent_of(
    &self,
    id: &str,
  ) -> Option<&str>
  {
    fn walk<'a>(
      nodes: &'a [FileNode],
      id: &str,
    ) -> Option<&'a str>
    {
      for node in nodes
      {
        if node.children.iter().any(|c| c.id == id)
        {
          return Some(node.id.as_str());
        }
        if let Some(found) = walk(&node.children, id)
        {
          return Some(found);
        }
      }
      None
    }
    walk(&self.roots, id)
  }

  /// Every other `.lua` file as a `require`-able module.
  ///
  /// Files are registered by their dotted path below the top-level project
  /// folder (`src.utils`); siblings of `running_id` are also reachable by bare
  /// name (`utils`).
  pub fn lua_modules(
    &self,
    running_id: &str,
  ) -> ModuleMap
  {
    fn walk(
      nodes: &[FileNode],
      prefix: &[String],
      out: &mut Vec<(Vec<String>, String, String)>,
    )
    {
      for node in nodes
      {
        if node.kind == NodeKind::Folder
        {
          let mut p = prefix.to_vec();
          p.push(node.name.clone());
          walk(&node.children, &p, out);
        }
        else if node.is_lua()
        {
          out.push((prefix.to_vec(), node.id.clone(), node.name.clone()));
        }
      }
    }
    let mut files = Vec::new();
    for root in &self.roots
    {
      match root.kind
      {
        NodeKind::Folder => walk(&root.children, &[], &mut files),
        NodeKind::File => walk(std::slice::from_ref(root), &[], &mut files),
      }
    }
    let sibling_dir = self.parent_of(running_id).map(str::to_string);
    let mut modules = ModuleMap::new();
    for (dirs, id, name) in files
    {
      if id == running_id
      {
        continue;
      }
      let Some(node) = self.find(&id)
      else
      {
        continue;
      };
      let stem = name.trim_end_matches(".lua").to_string();
      let mut dotted = dirs;
      dotted.push(stem.clone());
      modules.insert(dotted.join("."), node.content.clone());
      if sibling_dir.is_some() && self.parent_of(&id) == sibling_dir.as_deref()
      {
        modules.entry(stem).or_insert_with(|| node.content.clone());
      }
    }
    modules
  }
}
