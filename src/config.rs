//! Loading the user's `init.lua` into a typed [`Config`].
//!
//! The config file runs in its own small Lua state that only sees the `studio`
//! table; nothing from it leaks into the script sandbox.

mod api;
mod loader;
mod lua_engine;
mod paths;
mod types;

pub(crate) use api::install_studio_api;
pub use loader::{
  load_config,
  load_config_from_code,
};
pub use lua_engine::ConfigEngine;
pub use paths::{
  ConfigPaths,
  discover_config_paths,
};
pub use types::{
  Config,
  UiConfig,
};
