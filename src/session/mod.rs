//! Chat session and conversation transcript.
//!
//! A [`ChatSession`] owns an ordered, append-only [`Transcript`] of
//! [`Turn`]s and talks to the ask endpoint through a
//! [`RequestTransport`](crate::transport::RequestTransport).
//!
//! # States
//!
//! A session is either idle or awaiting a reply. [`ChatSession::submit`]
//! moves it to awaiting-reply when it sends, and back to idle when the
//! exchange settles, successfully or not. Submissions made while a reply is
//! outstanding return [`SubmitOutcome::Busy`] without touching the network.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use partselect_chat::session::ChatSession;
//! use partselect_chat::transport::HttpTransport;
//!
//! let transport = HttpTransport::new("http://localhost:8000/ask".parse()?);
//! let session = ChatSession::new(Arc::new(transport));
//! session.submit("Is this ice maker compatible with my fridge?").await;
//!
//! for turn in &session.transcript() {
//!     println!("{}: {}", turn.role().label(), turn.content());
//! }
//! ```

mod chat;
mod turn;

pub use chat::{ChatSession, DEFAULT_FALLBACK_TEXT, SessionState, SubmitOutcome};
pub use turn::{Role, Transcript, Turn};
