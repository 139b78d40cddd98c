use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::execution::{parse_agent_decision, AgentDecision};
use super::instructions::build_agent_instructions;
use crate::core::config::service::redact_sensitive_values;
use crate::core::config::AgentSettings;
use crate::core::errors::ApiError;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};
use crate::session::{current_corpus, Session};
use crate::tools::{execute_tool, tool_definitions, ToolContext, ToolResult};

const MAX_STEPS_FALLBACK: &str =
    "I could not finish that request within the allowed number of steps. Please try again or rephrase it.";

#[derive(Debug, Clone, Serialize)]
pub struct ToolCallRecord {
    pub tool: String,
    /// Arguments with sensitive values redacted.
    pub args: Value,
    pub result: ToolResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub reply: String,
    pub tool_calls: Vec<ToolCallRecord>,
}

/// Drives one conversational turn: LLM decision, tool execution, repeat.
#[derive(Clone)]
pub struct AgentRuntime {
    llm: Arc<dyn LlmProvider>,
    tools: ToolContext,
    settings: AgentSettings,
    temperature: Option<f64>,
    deletion_enabled: bool,
}

impl AgentRuntime {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        tools: ToolContext,
        settings: AgentSettings,
        temperature: Option<f64>,
        deletion_enabled: bool,
    ) -> Self {
        Self {
            llm,
            tools,
            settings,
            temperature,
            deletion_enabled,
        }
    }

    pub fn tools(&self) -> &ToolContext {
        &self.tools
    }

    /// Runs a turn against `session`; the caller holds the session lock.
    ///
    /// History is only extended once the turn produced a reply.
    pub async fn run_turn(
        &self,
        session: &mut Session,
        user_input: &str,
    ) -> Result<TurnOutcome, ApiError> {
        let user_input = user_input.trim();
        if user_input.is_empty() {
            return Err(ApiError::BadRequest("Message must not be empty".to_string()));
        }

        let instructions = build_agent_instructions(
            &tool_definitions(),
            current_corpus(&session.state).as_deref(),
            self.deletion_enabled,
        );
        let mut messages = Vec::with_capacity(session.history.len() + 2);
        messages.push(ChatMessage::system(instructions));
        messages.extend(session.history.iter().cloned());
        messages.push(ChatMessage::user(user_input));

        let max_steps = self.settings.max_steps.max(1);
        let mut tool_calls = Vec::new();

        for step in 0..max_steps {
            tracing::debug!(
                "Session {} reasoning step {}/{} via {}",
                session.id,
                step + 1,
                max_steps,
                self.llm.name()
            );
            let request = ChatRequest::new(messages.clone()).with_temperature(self.temperature);
            let response = self.llm.chat(request).await?;

            match parse_agent_decision(&response) {
                AgentDecision::Final(content) => {
                    session.history.push(ChatMessage::user(user_input));
                    session.history.push(ChatMessage::assistant(content.clone()));
                    return Ok(TurnOutcome {
                        reply: content,
                        tool_calls,
                    });
                }
                AgentDecision::ToolCall { name, args } => {
                    let result = execute_tool(&self.tools, &name, &args, &mut session.state).await;
                    let payload = serde_json::to_string(&result.to_value()).unwrap_or_default();

                    messages.push(ChatMessage::assistant(response));
                    messages.push(ChatMessage::system(format!(
                        "Tool `{}` result:\n{}",
                        name, payload
                    )));
                    tool_calls.push(ToolCallRecord {
                        tool: name,
                        args: redact_sensitive_values(&args),
                        result,
                    });
                }
            }
        }

        tracing::warn!(
            "Session {} hit the step limit ({}) without a final answer",
            session.id,
            max_steps
        );
        session.history.push(ChatMessage::user(user_input));
        session
            .history
            .push(ChatMessage::assistant(MAX_STEPS_FALLBACK));
        Ok(TurnOutcome {
            reply: MAX_STEPS_FALLBACK.to_string(),
            tool_calls,
        })
    }
}
