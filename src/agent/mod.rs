pub mod execution;
pub mod instructions;
pub mod runtime;

pub use runtime::{AgentRuntime, ToolCallRecord, TurnOutcome};
