//! Reference-material ingestion: local file upload and remote URL
//! registration. The two channels share nothing with each other or with chat.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::backend::{Backend, UploadAck};
use crate::config::UploadConfig;
use crate::diagnostics::{Channel, DiagnosticLog};
use crate::error::{BackendError, RejectReason, UrlIngestError};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// A document picked by the user, content included.
///
/// A handle opened with [`FileHandle::read_checked`] for a file that breaks
/// enforced limits carries only its name and size; its content is never read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    name: String,
    size_bytes: u64,
    bytes: Vec<u8>,
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("{} does not name a file", path.display()))
}

impl FileHandle {
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        FileHandle {
            name: name.into(),
            size_bytes: bytes.len() as u64,
            bytes,
        }
    }

    pub async fn read(path: &Path) -> Result<Self> {
        let name = file_name(path)?;
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(FileHandle::from_bytes(name, bytes))
    }

    /// Like [`FileHandle::read`], but looks at the name and size first and
    /// skips reading content that enforced `limits` would reject anyway.
    pub async fn read_checked(path: &Path, limits: &UploadLimits) -> Result<Self> {
        let name = file_name(path)?;
        let size_bytes = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("inspecting {}", path.display()))?
            .len();

        let unread = FileHandle {
            name,
            size_bytes,
            bytes: Vec::new(),
        };
        if limits.enforce && limits.check(&unread).is_err() {
            return Ok(unread);
        }

        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(FileHandle::from_bytes(unread.name, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Lowercased extension, empty when the name has none.
    pub fn extension(&self) -> String {
        Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }

    pub fn content_type(&self) -> &'static str {
        match self.extension().as_str() {
            "pdf" => "application/pdf",
            "txt" => "text/plain",
            "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            _ => "application/octet-stream",
        }
    }

    pub fn descriptor(&self) -> UploadedFileDescriptor {
        UploadedFileDescriptor {
            name: self.name.clone(),
            size_bytes: self.size_bytes(),
        }
    }
}

/// What the user most recently picked, for display only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFileDescriptor {
    pub name: String,
    pub size_bytes: u64,
}

impl UploadedFileDescriptor {
    /// Size as shown next to the file name, e.g. `2.00 MB`.
    pub fn size_label(&self) -> String {
        format!("{:.2} MB", self.size_bytes as f64 / BYTES_PER_MB)
    }
}

/// Type and size limits advertised to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_bytes: u64,
    pub allowed_extensions: Vec<String>,
    pub enforce: bool,
}

impl Default for UploadLimits {
    fn default() -> Self {
        UploadLimits::from(&UploadConfig::default())
    }
}

impl From<&UploadConfig> for UploadLimits {
    fn from(config: &UploadConfig) -> Self {
        UploadLimits {
            max_bytes: config.max_bytes,
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            enforce: config.enforce_limits,
        }
    }
}

impl UploadLimits {
    pub fn check(&self, file: &FileHandle) -> Result<(), RejectReason> {
        let ext = file.extension();
        if !self.allowed_extensions.iter().any(|allowed| *allowed == ext) {
            return Err(RejectReason::UnsupportedExtension(ext));
        }
        if file.size_bytes() > self.max_bytes {
            return Err(RejectReason::FileTooLarge {
                size: file.size_bytes(),
                max: self.max_bytes,
            });
        }
        Ok(())
    }

    /// Hint line shown under the drop area, e.g. `PDF, TXT, DOCX (MAX. 10MB)`.
    pub fn hint(&self) -> String {
        let types: Vec<String> = self
            .allowed_extensions
            .iter()
            .map(|e| e.to_uppercase())
            .collect();
        format!(
            "{} (MAX. {}MB)",
            types.join(", "),
            (self.max_bytes as f64 / BYTES_PER_MB).round() as u64
        )
    }
}

/// An accepted upload waiting for its network round-trip.
#[derive(Debug)]
pub struct PendingUpload {
    ticket: u64,
    file: FileHandle,
}

impl PendingUpload {
    pub fn file(&self) -> &FileHandle {
        &self.file
    }

    /// Perform the upload. This is the only suspension point of the
    /// workflow.
    pub async fn run(self, backend: Arc<dyn Backend>) -> UploadReply {
        let name = self.file.name.clone();
        let result = backend.upload(self.file).await;
        UploadReply {
            ticket: self.ticket,
            name,
            result,
        }
    }
}

/// Result of an upload, only obtainable from [`PendingUpload::run`].
#[derive(Debug, Clone)]
pub struct UploadReply {
    pub(crate) ticket: u64,
    pub(crate) name: String,
    pub(crate) result: Result<UploadAck, BackendError>,
}

impl UploadReply {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn result(&self) -> &Result<UploadAck, BackendError> {
        &self.result
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Ingested(UploadAck),
    Failed(BackendError),
    /// The reply does not belong to the upload in flight; nothing changed.
    Ignored,
}

/// File-upload channel state.
#[derive(Debug, Default)]
pub struct UploadChannel {
    in_flight: Option<u64>,
    next_ticket: u64,
    selected: Option<UploadedFileDescriptor>,
    limits: UploadLimits,
}

impl UploadChannel {
    pub fn new(limits: UploadLimits) -> Self {
        UploadChannel {
            in_flight: None,
            next_ticket: 0,
            selected: None,
            limits,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn selected(&self) -> Option<&UploadedFileDescriptor> {
        self.selected.as_ref()
    }

    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    /// React to a selection event. The descriptor is recorded as soon as a
    /// file is accepted for consideration, before any transmission, and is
    /// never rolled back by a later failure.
    pub fn begin(
        &mut self,
        selected: Option<FileHandle>,
        diagnostics: &mut DiagnosticLog,
    ) -> Result<PendingUpload, RejectReason> {
        let file = selected.ok_or(RejectReason::NoFile)?;
        if self.is_busy() {
            return Err(RejectReason::Busy);
        }

        self.selected = Some(file.descriptor());

        if let Err(reason) = self.limits.check(&file) {
            if self.limits.enforce {
                diagnostics.warn(
                    Channel::Upload,
                    format!("Not uploading {}: {}", file.name(), reason),
                );
                return Err(reason);
            }
            diagnostics.warn(
                Channel::Upload,
                format!("{} is outside advertised limits: {}", file.name(), reason),
            );
        }

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.in_flight = Some(ticket);
        Ok(PendingUpload { ticket, file })
    }

    pub fn finish(&mut self, reply: UploadReply, diagnostics: &mut DiagnosticLog) -> UploadOutcome {
        if self.in_flight != Some(reply.ticket) {
            tracing::debug!(name = %reply.name, "ignoring upload reply with no matching request");
            return UploadOutcome::Ignored;
        }
        self.in_flight = None;
        match reply.result {
            Ok(ack) => {
                diagnostics.info(
                    Channel::Upload,
                    format!("File uploaded: {} ({})", reply.name, ack.summary()),
                );
                UploadOutcome::Ingested(ack)
            }
            Err(err) => {
                let reason = match err.detail() {
                    Some(detail) => detail.to_string(),
                    None => err.to_string(),
                };
                diagnostics.error(
                    Channel::Upload,
                    format!("Failed to upload file {}: {}", reply.name, reason),
                );
                UploadOutcome::Failed(err)
            }
        }
    }
}

/// URL-ingestion channel.
///
/// Loading a document from a URL has no backend contract. Invoking it only
/// records the URL for display and answers [`UrlIngestError::Unsupported`];
/// no request is ever sent, so the busy flag never turns on.
#[derive(Debug, Default)]
pub struct UrlChannel {
    pending: String,
    busy: bool,
}

impl UrlChannel {
    /// Keystroke update of the URL field.
    pub fn set_pending(&mut self, value: impl Into<String>) {
        self.pending = value.into();
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn can_register(&self) -> bool {
        !self.busy && !self.pending.trim().is_empty()
    }

    pub fn register(
        &mut self,
        url: &str,
        diagnostics: &mut DiagnosticLog,
    ) -> Result<(), UrlIngestError> {
        if url.trim().is_empty() {
            return Err(UrlIngestError::Empty);
        }
        self.pending = url.to_string();
        diagnostics.info(Channel::Url, format!("Loading document from URL: {}", url));
        Err(UrlIngestError::Unsupported(url.to_string()))
    }
}
