// Public library interface for integration tests and embedding.
pub mod app;
pub mod config;
pub mod input;
pub mod runner;
pub mod runtime;
pub mod sandbox;
pub mod trace;
pub mod ui;
pub mod util;

pub use app::App;
pub use runner::{
  RunEvent,
  RunHandle,
  RunRequest,
  Runner,
  RunnerConfig,
};
