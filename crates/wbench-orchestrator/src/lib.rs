//! Agent registry, file store, fork/join session manager, orchestrator, and
//! context assembler (C1, C3, C2, C9, C10) for the agent workbench.

pub mod context_assembler;
pub mod error;
pub mod file_store;
pub mod fork_session;
pub mod orchestrator;
pub mod registry;

pub use context_assembler::{AssembledContext, ContextAssembler};
pub use error::{OrchestratorError, OrchestratorResult};
pub use file_store::AgentFileStore;
pub use fork_session::{ForkError, ForkSessionManager};
pub use orchestrator::Orchestrator;
pub use registry::AgentRegistry;
