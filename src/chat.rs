//! Query submission: one question at a time against the answering service.

use std::sync::Arc;

use crate::backend::Backend;
use crate::diagnostics::{Channel, DiagnosticLog};
use crate::error::{BackendError, RejectReason};
use crate::exchange::{Exchange, ExchangeLog};

/// A question that passed the gate and now owns the chat channel until its
/// reply is handed back to [`QueryController::finish`].
#[derive(Debug)]
pub struct PendingQuery {
    ticket: u64,
    query: String,
}

impl PendingQuery {
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Ask the backend. The network call is the only suspension point of a
    /// chat round-trip.
    pub async fn run(self, backend: Arc<dyn Backend>) -> ChatReply {
        let result = backend.ask(&self.query).await;
        ChatReply {
            ticket: self.ticket,
            query: self.query,
            result,
        }
    }
}

/// Result of a round-trip, only obtainable from [`PendingQuery::run`].
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub(crate) ticket: u64,
    pub(crate) query: String,
    pub(crate) result: Result<String, BackendError>,
}

impl ChatReply {
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn result(&self) -> &Result<String, BackendError> {
        &self.result
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutcome {
    /// The exchange was appended at this position of the log.
    Answered(usize),
    /// Nothing was appended; the error is what the user gets told.
    Failed(BackendError),
    /// The reply does not belong to the request in flight; nothing changed.
    Ignored,
}

/// Chat channel state: the input buffer and its busy flag.
#[derive(Debug, Default)]
pub struct QueryController {
    input: String,
    in_flight: Option<u64>,
    next_ticket: u64,
}

impl QueryController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, value: impl Into<String>) {
        self.input = value.into();
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Whether the send action should be enabled for the current buffer.
    pub fn can_submit(&self) -> bool {
        !self.is_busy() && !self.input.trim().is_empty()
    }

    /// Accept `query` for submission. Whitespace-only questions and
    /// submissions while a request is outstanding are refused without
    /// touching any state.
    pub fn begin(&mut self, query: &str) -> Result<PendingQuery, RejectReason> {
        if query.trim().is_empty() {
            return Err(RejectReason::EmptyInput);
        }
        if self.is_busy() {
            return Err(RejectReason::Busy);
        }

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.in_flight = Some(ticket);
        Ok(PendingQuery {
            ticket,
            query: query.to_string(),
        })
    }

    /// Apply a finished round-trip. A successful answer becomes one complete
    /// exchange in a single append; a failure only reaches the diagnostics
    /// and leaves the log and input untouched. A reply for anything but the
    /// request currently in flight is ignored.
    pub fn finish(
        &mut self,
        reply: ChatReply,
        log: &mut ExchangeLog,
        diagnostics: &mut DiagnosticLog,
    ) -> ChatOutcome {
        if self.in_flight != Some(reply.ticket) {
            tracing::debug!(query = %reply.query, "ignoring reply with no matching request");
            return ChatOutcome::Ignored;
        }
        self.in_flight = None;
        match reply.result {
            Ok(response) => {
                let index = log.append(Exchange::new(reply.query, response));
                self.input.clear();
                ChatOutcome::Answered(index)
            }
            Err(err) => {
                diagnostics.error(
                    Channel::Chat,
                    format!("Error fetching response for {:?}: {}", reply.query, err),
                );
                ChatOutcome::Failed(err)
            }
        }
    }
}
