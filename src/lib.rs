//! Client-side orchestration for a retrieval-augmented question-answering
//! assistant: conversation history, single-flight question submission,
//! document ingestion channels and scroll-follow for the conversation view.

pub mod backend;
pub mod chat;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod exchange;
pub mod ingest;
pub mod session;
pub mod view_sync;

pub use backend::{Backend, RagClient, UploadAck};
pub use chat::{ChatOutcome, ChatReply, PendingQuery, QueryController};
pub use config::Config;
pub use error::{BackendError, RejectReason, UrlIngestError};
pub use exchange::{Exchange, ExchangeLog};
pub use ingest::{FileHandle, UploadedFileDescriptor, UploadChannel, UrlChannel};
pub use session::Session;
