//! Conversation session manager.
//!
//! Owns the active transcript, the ordered history of past
//! conversations, and the selection pointer linking the two. Every
//! mutation of history or the dark-mode preference is mirrored to the
//! injected [`StateStore`]; a failed write is logged and never fatal,
//! and corrupt stored state degrades to defaults on startup.

use crate::api::{ApiError, ChatBackend};
use crate::store::{StateStore, DARK_MODE_KEY, HISTORY_KEY};
use crate::transcript::{Message, Transcript};
use tracing::{error, warn};

/// Bot message shown when the request reached no responder.
const NO_RESPONSE_MESSAGE: &str = "No response from server. Please check backend.";

/// Bot message for failures with no better explanation.
const GENERIC_FAILURE_MESSAGE: &str = "Error: Could not connect to backend";

/// Errors from session operations.
#[derive(Debug, thiserror::Error)]
pub(crate) enum SessionError {
    #[error("No saved chat at index {0}")]
    NoSuchChat(usize),
}

/// How a send attempt concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SendOutcome {
    /// Input was empty after trimming; nothing happened.
    Ignored,
    /// The bot reply was appended.
    Replied,
    /// A synthesized failure message was appended.
    Failed,
}

pub(crate) struct SessionManager<S: StateStore> {
    store: S,
    active: Transcript,
    history: Vec<Transcript>,
    selected: Option<usize>,
    dark_mode: bool,
}

impl<S: StateStore> SessionManager<S> {
    /// Restore a session from the store. Missing or malformed entries
    /// fall back to an empty history and light mode.
    pub(crate) fn restore(store: S) -> Self {
        let history = read_json(&store, HISTORY_KEY).unwrap_or_default();
        let dark_mode = read_json(&store, DARK_MODE_KEY).unwrap_or_default();
        Self {
            store,
            active: Transcript::new(),
            history,
            selected: None,
            dark_mode,
        }
    }

    pub(crate) fn active(&self) -> &Transcript {
        &self.active
    }

    pub(crate) fn history_len(&self) -> usize {
        self.history.len()
    }

    pub(crate) fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub(crate) fn dark_mode(&self) -> bool {
        self.dark_mode
    }

    /// Toggle the dark-mode preference and persist it.
    pub(crate) fn toggle_dark_mode(&mut self) -> bool {
        self.dark_mode = !self.dark_mode;
        let dark = self.dark_mode;
        self.write_json(DARK_MODE_KEY, &dark);
        dark
    }

    /// Begin a fresh conversation. A non-empty active transcript that
    /// was never archived is appended first; a transcript loaded from
    /// history is already mirrored at its slot, so archiving it again
    /// would duplicate it. Starting over with an empty transcript adds
    /// nothing to history.
    pub(crate) fn start_new(&mut self) {
        if !self.active.is_empty() && self.selected.is_none() {
            self.history.push(std::mem::take(&mut self.active));
            self.persist_history();
        }
        self.active = Transcript::new();
        self.selected = None;
    }

    /// Replace the active transcript with a copy of a history entry.
    /// The stored entry stays untouched until the next exchange.
    pub(crate) fn load(&mut self, index: usize) -> Result<(), SessionError> {
        let entry = self
            .history
            .get(index)
            .ok_or(SessionError::NoSuchChat(index))?;
        self.active = entry.clone();
        self.selected = Some(index);
        Ok(())
    }

    /// Mirror the active transcript into its history slot, appending a
    /// new slot when the conversation has not been archived yet. Called
    /// after every completed exchange so each conversation with at
    /// least one exchange is discoverable without an explicit save.
    fn record_exchange(&mut self) {
        match self.selected {
            Some(i) => {
                self.history[i] = self.active.clone();
            }
            None => {
                self.history.push(self.active.clone());
                self.selected = Some(self.history.len() - 1);
            }
        }
        self.persist_history();
    }

    /// Run one send: echo the user message, ask the backend, append
    /// the reply or a synthesized failure message, and mirror the
    /// exchange into history. Whitespace-only input is ignored.
    pub(crate) async fn send(
        &mut self,
        input: &str,
        backend: &dyn ChatBackend,
        token: &str,
    ) -> SendOutcome {
        let text = input.trim();
        if text.is_empty() {
            return SendOutcome::Ignored;
        }

        self.active.push(Message::user(text));

        let outcome = match backend.send_message(text, token).await {
            Ok(reply) => {
                self.active.push(Message::bot(reply));
                SendOutcome::Replied
            }
            Err(e) => {
                warn!("Send failed: {}", e);
                self.active.push(Message::bot(failure_message(&e)));
                SendOutcome::Failed
            }
        };

        self.record_exchange();
        outcome
    }

    /// Snapshot of the stored history, for listing in the UI.
    pub(crate) fn history(&self) -> &[Transcript] {
        &self.history
    }

    fn persist_history(&mut self) {
        let history = self.history.clone();
        self.write_json(HISTORY_KEY, &history);
    }

    fn write_json<T: serde::Serialize>(&mut self, key: &str, value: &T) {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to serialize {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.store.save(key, &bytes) {
            error!("Failed to persist {}: {}", key, e);
        }
    }
}

/// Pick the Bot message for a failed send: the server's own error text
/// when it sent one, a fixed no-responder message when nothing
/// answered, and a generic fallback otherwise.
fn failure_message(error: &ApiError) -> String {
    match error {
        ApiError::ServerRejected { message, .. } if !message.is_empty() => message.clone(),
        ApiError::NetworkUnreachable(_) => NO_RESPONSE_MESSAGE.to_string(),
        _ => GENERIC_FAILURE_MESSAGE.to_string(),
    }
}

/// Read and deserialize one store entry. Absent entries and corrupt
/// payloads both yield `None`, the latter with a logged error so
/// startup never propagates a parse fault.
fn read_json<T: serde::de::DeserializeOwned>(store: &impl StateStore, key: &str) -> Option<T> {
    let bytes = match store.load(key) {
        Ok(bytes) => bytes?,
        Err(e) => {
            error!("Failed to read {}: {}", key, e);
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            error!("Stored {} is corrupt, falling back to default: {}", key, e);
            None
        }
    }
}
