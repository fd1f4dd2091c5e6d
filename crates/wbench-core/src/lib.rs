//! Shared identifiers, data model, and host-editor contract for the agent
//! workbench. Every other `wbench-*` crate depends on this one; it depends
//! on nothing workbench-specific.

pub mod agent;
pub mod approval;
pub mod error;
pub mod host;
pub mod ids;
pub mod message;
pub mod path;

pub use agent::{AgentDocument, AgentMetadata, AgentRecord, MetadataPatch};
pub use approval::{ApprovalDecision, ApprovalRequest, ApprovalStatus};
pub use error::CoreError;
pub use host::{DirEntry, DocumentLocation, HostEditor, HostEvent};
pub use ids::{AgentId, ApprovalId};
pub use message::{ContentPart, ConversationMessage, MessageContent, Role, ToolCall};
pub use path::AllowedPaths;
