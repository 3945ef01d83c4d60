//! llm-chat is a terminal assistant that routes chat turns to interchangeable
//! LLM providers through named prompt roles.
//!
//! - [`models`] holds the plain data: messages, provider and role entries.
//! - [`providers`] defines the [`providers::ProviderClient`] capability, one
//!   client per wire protocol, and the router that resolves `provider:model`
//!   identifiers into live clients.
//! - [`services`] holds the role engine, conversation history with its
//!   neutralization pass, the [`services::ChatSession`] orchestrator and the
//!   YAML-backed configuration store.
//! - [`ui`] is the line-oriented REPL and its `:command` dispatcher.

pub mod config;
pub mod models;
pub mod providers;
pub mod services;
pub mod ui;
