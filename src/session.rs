//! The screen-level session: owns every piece of conversation and ingestion
//! state and hands each workflow only the slice it mutates.

use crate::chat::{ChatOutcome, ChatReply, PendingQuery, QueryController};
use crate::config::Config;
use crate::diagnostics::{Channel, DiagnosticLog};
use crate::error::{BackendError, RejectReason, UrlIngestError};
use crate::exchange::ExchangeLog;
use crate::ingest::{
    FileHandle, PendingUpload, UploadChannel, UploadLimits, UploadOutcome, UploadReply, UrlChannel,
};
use crate::view_sync::{ScrollCommand, ScrollFollower};

#[derive(Debug, Default)]
pub struct Session {
    log: ExchangeLog,
    chat: QueryController,
    upload: UploadChannel,
    url: UrlChannel,
    diagnostics: DiagnosticLog,
    follower: ScrollFollower,
    last_error: Option<BackendError>,
}

impl Session {
    pub fn new(config: &Config) -> Self {
        Session {
            log: ExchangeLog::new(),
            chat: QueryController::new(),
            upload: UploadChannel::new(UploadLimits::from(&config.upload)),
            url: UrlChannel::default(),
            diagnostics: DiagnosticLog::with_capacity(config.diagnostics.capacity),
            follower: ScrollFollower::new(),
            last_error: None,
        }
    }

    pub fn exchanges(&self) -> &ExchangeLog {
        &self.log
    }

    pub fn chat(&self) -> &QueryController {
        &self.chat
    }

    pub fn upload(&self) -> &UploadChannel {
        &self.upload
    }

    pub fn url(&self) -> &UrlChannel {
        &self.url
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.diagnostics
    }

    /// Failure of the most recent chat round-trip, shown beneath the
    /// conversation until dismissed or a new question is accepted.
    pub fn last_error(&self) -> Option<&BackendError> {
        self.last_error.as_ref()
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    pub fn set_query_input(&mut self, value: impl Into<String>) {
        self.chat.set_input(value);
    }

    pub fn submit(&mut self, query: &str) -> Result<PendingQuery, RejectReason> {
        let pending = self.chat.begin(query)?;
        self.last_error = None;
        Ok(pending)
    }

    /// Submit whatever is in the input buffer.
    pub fn submit_input(&mut self) -> Result<PendingQuery, RejectReason> {
        let query = self.chat.input().to_string();
        self.submit(&query)
    }

    pub fn complete_query(&mut self, reply: ChatReply) -> ChatOutcome {
        let outcome = self.chat.finish(reply, &mut self.log, &mut self.diagnostics);
        if let ChatOutcome::Failed(err) = &outcome {
            self.last_error = Some(err.clone());
        }
        outcome
    }

    pub fn select_file(&mut self, selected: Option<FileHandle>) -> Result<PendingUpload, RejectReason> {
        self.upload.begin(selected, &mut self.diagnostics)
    }

    pub fn complete_upload(&mut self, reply: UploadReply) -> UploadOutcome {
        self.upload.finish(reply, &mut self.diagnostics)
    }

    /// The picker itself failed (unreadable file); nothing was selected.
    pub fn report_pick_error(&mut self, message: impl Into<String>) {
        self.diagnostics.error(
            Channel::Upload,
            format!("Error reading selected file: {}", message.into()),
        );
    }

    pub fn set_url_input(&mut self, value: impl Into<String>) {
        self.url.set_pending(value);
    }

    pub fn register_url(&mut self, url: &str) -> Result<(), UrlIngestError> {
        self.url.register(url, &mut self.diagnostics)
    }

    /// Invoke after the conversation view reflects the current log.
    pub fn sync_view(&mut self) -> Option<ScrollCommand> {
        self.follower.observe(self.log.len())
    }
}
