//! The agent runner, UI renderer, controller glue, sidebar projection, and
//! user-facing commands (C7, C8, C11, C12) for the agent workbench.

pub mod commands;
pub mod config;
pub mod controller;
pub mod error;
pub mod runner;
pub mod sidebar;
pub mod ui;

pub use commands::{Command, CommandDispatcher};
pub use config::RuntimeConfig;
pub use controller::{CellExecution, CellResult, Controller};
pub use error::{RuntimeError, RuntimeResult};
pub use runner::{AgentRunner, RunOutcome, RunnerConfig};
pub use sidebar::{snapshot as sidebar_snapshot, SidebarNode, SidebarSnapshot};
pub use ui::UiRenderer;
