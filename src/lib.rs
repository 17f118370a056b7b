//! PartSelect chat
//!
//! A request/response chat client for an appliance-parts assistant, and the
//! ask endpoint it talks to.
//!
//! # Architecture
//!
//! - **Client**: a [`session::ChatSession`] keeps the transcript and sends each
//!   message with the full history through a [`transport::RequestTransport`]
//! - **Front end**: a terminal chat loop that renders turns as chat bubbles
//! - **Server**: Axum `POST /ask` endpoint answering through an
//!   OpenAI-compatible model
//!
//! # Modules
//!
//! - [`session`]: Turns, transcript and the chat session
//! - [`transport`]: Ask request/response wire types and the HTTP transport
//! - [`repl`]: Terminal chat loop
//! - [`agent`]: The assistant behind the ask endpoint
//! - [`llm`]: Chat Completions and embeddings clients
//! - [`retrieval`]: Stored product content the agent's tools read
//! - [`server`]: HTTP router for the ask endpoint
//! - [`config`]: Command line and layered configuration

#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]

pub mod agent;
pub mod config;
pub mod llm;
pub mod repl;
pub mod retrieval;
pub mod server;
pub mod session;
pub mod transport;

use std::sync::Arc;

use agent::AskAgent;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Assistant answering ask requests.
    pub agent: Arc<dyn AskAgent>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
