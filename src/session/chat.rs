//! The chat session: transcript, pending input and the loading flag.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use super::turn::{Transcript, Turn};
use crate::transport::{AskRequest, RequestTransport};

/// Agent turn content used when the endpoint gives nothing better.
pub const DEFAULT_FALLBACK_TEXT: &str = "Error";

/// Snapshot of everything a session tracks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub transcript: Transcript,
    /// Text typed but not yet submitted.
    pub pending_input: String,
    /// True strictly between a submission and its reply.
    pub is_awaiting_reply: bool,
}

/// What a call to [`ChatSession::submit`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Input was empty or whitespace; nothing changed.
    Ignored,
    /// A reply is already being awaited; nothing was sent.
    Busy,
    /// The exchange settled and this agent turn was appended.
    Replied(Turn),
}

/// A single conversation with the ask endpoint.
///
/// All mutation goes through [`submit`](Self::submit). The state lock is
/// never held across the transport call, so other callers can observe the
/// session while a reply is outstanding.
pub struct ChatSession {
    id: String,
    transport: Arc<dyn RequestTransport>,
    fallback_text: String,
    state: Mutex<SessionState>,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("id", &self.id)
            .field("fallback_text", &self.fallback_text)
            .field("state", &*self.lock_state())
            .finish()
    }
}

impl ChatSession {
    /// Create an idle session with an empty transcript.
    #[must_use]
    pub fn new(transport: Arc<dyn RequestTransport>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            transport,
            fallback_text: DEFAULT_FALLBACK_TEXT.to_string(),
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Replace the text shown when a reply carries neither field.
    #[must_use]
    pub fn with_fallback_text(mut self, text: impl Into<String>) -> Self {
        self.fallback_text = text.into();
        self
    }

    /// Session ID used to correlate log lines.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Copy of the transcript so far.
    #[must_use]
    pub fn transcript(&self) -> Transcript {
        self.lock_state().transcript.clone()
    }

    #[must_use]
    pub fn is_awaiting_reply(&self) -> bool {
        self.lock_state().is_awaiting_reply
    }

    #[must_use]
    pub fn pending_input(&self) -> String {
        self.lock_state().pending_input.clone()
    }

    /// Replace the not-yet-submitted input text.
    pub fn set_pending_input(&self, text: impl Into<String>) {
        self.lock_state().pending_input = text.into();
    }

    /// Copy of the full state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.lock_state().clone()
    }

    /// Submit whatever is in the pending input buffer.
    pub async fn submit_pending(&self) -> SubmitOutcome {
        let text = self.pending_input();
        self.submit(&text).await
    }

    /// Submit a user message and wait for the agent's reply.
    ///
    /// Appends the user turn, sends it together with the transcript, then
    /// appends exactly one agent turn whatever the outcome of the exchange.
    /// Transport failures become a fallback agent turn. So does dropping the
    /// returned future before it completes, e.g. under a timeout, which also
    /// leaves the session idle.
    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        if text.trim().is_empty() {
            return SubmitOutcome::Ignored;
        }

        let request = {
            let mut state = self.lock_state();
            if state.is_awaiting_reply {
                tracing::debug!(
                    name: "chat.submit.busy",
                    session_id = %self.id,
                    "Submission rejected while awaiting reply"
                );
                return SubmitOutcome::Busy;
            }
            state.transcript.push(Turn::user(text));
            state.is_awaiting_reply = true;
            AskRequest {
                message: text.to_string(),
                history: state.transcript.turns().to_vec(),
            }
        };

        let in_flight = InFlight {
            session: self,
            settled: false,
        };

        tracing::debug!(
            name: "chat.submit.sent",
            session_id = %self.id,
            history_len = request.history.len(),
            "Submitting message"
        );

        let content = match self.transport.ask(&request).await {
            Ok(resp) => {
                if resp.response.as_deref().is_none_or(str::is_empty) {
                    tracing::warn!(
                        name: "chat.reply.error",
                        session_id = %self.id,
                        error = ?resp.error,
                        "Endpoint returned no response"
                    );
                }
                resp.into_reply_text(&self.fallback_text)
            }
            Err(e) => {
                tracing::warn!(
                    name: "chat.reply.transport_failed",
                    session_id = %self.id,
                    error = %e,
                    "Transport failure"
                );
                self.fallback_text.clone()
            }
        };

        SubmitOutcome::Replied(in_flight.settle(content))
    }

    /// Append the agent turn that ends an exchange and go idle.
    fn finish_exchange(&self, content: String) -> Turn {
        let reply = Turn::agent(content);
        let mut state = self.lock_state();
        state.transcript.push(reply.clone());
        state.is_awaiting_reply = false;
        state.pending_input.clear();
        reply
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An exchange waiting on the transport. Dropped unsettled, it ends the
/// exchange with the fallback turn.
struct InFlight<'a> {
    session: &'a ChatSession,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(mut self, content: String) -> Turn {
        self.settled = true;
        self.session.finish_exchange(content)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        tracing::warn!(
            name: "chat.submit.cancelled",
            session_id = %self.session.id,
            "Submission dropped before the reply arrived"
        );
        self.session.finish_exchange(self.session.fallback_text.clone());
    }
}
