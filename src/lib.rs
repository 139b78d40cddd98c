//! Conversational agent for managing document corpora on a managed RAG
//! service: corpus resolution and existence tracking, the corpus tools, and
//! the HTTP/agent front-end that drives them.

pub mod agent;
pub mod core;
pub mod llm;
pub mod rag;
pub mod server;
pub mod session;
pub mod state;
pub mod tools;
