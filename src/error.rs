//! Error and rejection types shared by the chat and ingestion channels.

use std::fmt;

/// Failure of a round-trip against the answering service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The request never produced a response (connect refused, DNS, IO).
    #[error("transport error: {0}")]
    Transport(String),
    /// The service answered with a non-2xx status.
    #[error("{}", status_message(.status, .detail, .body))]
    Status {
        status: u16,
        detail: Option<String>,
        body: String,
    },
    /// A 2xx response whose body is not the JSON shape we expect.
    #[error("malformed response: {0}")]
    Malformed(String),
}

fn status_message(status: &u16, detail: &Option<String>, body: &str) -> String {
    match detail.as_deref() {
        Some(detail) => format!("server returned {}: {}", status, detail),
        None if body.is_empty() => format!("server returned {}", status),
        None => format!("server returned {}: {}", status, body),
    }
}

impl BackendError {
    /// Server-provided explanation, if the failure carried one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            BackendError::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Malformed(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

/// Why an entry point declined to start a request. Rejections are silent
/// no-ops for the user: nothing is sent and no state changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    EmptyInput,
    Busy,
    NoFile,
    FileTooLarge { size: u64, max: u64 },
    UnsupportedExtension(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::EmptyInput => write!(f, "input is empty"),
            RejectReason::Busy => write!(f, "a request is already in flight"),
            RejectReason::NoFile => write!(f, "no file selected"),
            RejectReason::FileTooLarge { size, max } => {
                write!(f, "file is {} bytes, limit is {} bytes", size, max)
            }
            RejectReason::UnsupportedExtension(ext) if ext.is_empty() => {
                write!(f, "file has no extension")
            }
            RejectReason::UnsupportedExtension(ext) => {
                write!(f, "unsupported file type: .{}", ext)
            }
        }
    }
}

/// Result of invoking URL ingestion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlIngestError {
    #[error("url is empty")]
    Empty,
    /// URL ingestion has no backend contract yet; the URL is only recorded
    /// for display.
    #[error("loading documents from a URL is not supported yet: {0}")]
    Unsupported(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_prefers_detail() {
        let err = BackendError::Status {
            status: 400,
            detail: Some("Please upload a PDF first".to_string()),
            body: r#"{"detail":"Please upload a PDF first"}"#.to_string(),
        };
        assert_eq!(err.to_string(), "server returned 400: Please upload a PDF first");
        assert_eq!(err.detail(), Some("Please upload a PDF first"));
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn status_error_falls_back_to_body() {
        let err = BackendError::Status {
            status: 502,
            detail: None,
            body: "Bad Gateway".to_string(),
        };
        assert_eq!(err.to_string(), "server returned 502: Bad Gateway");

        let err = BackendError::Status {
            status: 503,
            detail: None,
            body: String::new(),
        };
        assert_eq!(err.to_string(), "server returned 503");
    }

    #[test]
    fn transport_and_malformed_have_no_detail() {
        let err = BackendError::Transport("connection refused".to_string());
        assert_eq!(err.detail(), None);
        assert_eq!(err.status(), None);
        assert!(err.to_string().contains("connection refused"));

        let err = BackendError::Malformed("missing field `response`".to_string());
        assert!(err.to_string().starts_with("malformed response"));
    }

    #[test]
    fn reject_reason_display() {
        assert_eq!(RejectReason::Busy.to_string(), "a request is already in flight");
        assert_eq!(
            RejectReason::UnsupportedExtension("exe".to_string()).to_string(),
            "unsupported file type: .exe"
        );
        assert_eq!(
            RejectReason::UnsupportedExtension(String::new()).to_string(),
            "file has no extension"
        );
        assert_eq!(
            RejectReason::FileTooLarge { size: 11, max: 10 }.to_string(),
            "file is 11 bytes, limit is 10 bytes"
        );
    }

    #[test]
    fn url_unsupported_mentions_url() {
        let err = UrlIngestError::Unsupported("https://example.com/doc".to_string());
        assert!(err.to_string().contains("https://example.com/doc"));
    }
}
