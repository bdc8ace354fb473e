use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::Value;

use crate::error::BackendError;
use crate::ingest::FileHandle;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Characters left alone when a question is placed in the path, matching
/// what browsers do for `encodeURIComponent`.
const PATH_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Multipart field the ingestion endpoint reads the document from.
pub const UPLOAD_FIELD: &str = "file";

/// The answering/ingestion service as seen by the session.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Ask a question and return the markdown answer.
    async fn ask(&self, query: &str) -> Result<String, BackendError>;

    /// Hand a document to the ingestion endpoint. The handle is consumed so
    /// its content can become the request body without a copy.
    async fn upload(&self, file: FileHandle) -> Result<UploadAck, BackendError>;
}

/// Server acknowledgement for an accepted upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadAck {
    pub message: Option<String>,
    pub raw: Value,
}

impl UploadAck {
    pub fn from_value(raw: Value) -> Self {
        let message = raw
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string);
        UploadAck { message, raw }
    }

    pub fn summary(&self) -> String {
        match &self.message {
            Some(message) => message.clone(),
            None => self.raw.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    response: String,
}

pub struct RagClient {
    base_url: String,
    client: reqwest::Client,
}

impl RagClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        RagClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn chat_url(&self, query: &str) -> String {
        format!(
            "{}/chat/{}",
            self.base_url,
            utf8_percent_encode(query, PATH_COMPONENT)
        )
    }

    /// Ping the service root; used at startup to warn early when the
    /// backend is not running.
    pub async fn greet(&self) -> Result<Value, BackendError> {
        let response = self.client.get(format!("{}/", self.base_url)).send().await?;
        let body = read_success_body(response).await?;
        serde_json::from_str(&body).map_err(|e| BackendError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl Backend for RagClient {
    async fn ask(&self, query: &str) -> Result<String, BackendError> {
        let url = self.chat_url(query);
        tracing::debug!(%url, "sending question");

        let response = self.client.get(&url).send().await?;
        let body = read_success_body(response).await?;

        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|e| BackendError::Malformed(e.to_string()))?;
        Ok(parsed.response)
    }

    async fn upload(&self, file: FileHandle) -> Result<UploadAck, BackendError> {
        let url = format!("{}/upload", self.base_url);
        tracing::debug!(%url, name = file.name(), size = file.size_bytes(), "uploading document");

        let name = file.name().to_string();
        let content_type = file.content_type();
        let part = Part::bytes(file.into_bytes())
            .file_name(name)
            .mime_str(content_type)?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        let response = self.client.post(&url).multipart(form).send().await?;
        let body = read_success_body(response).await?;

        let raw: Value =
            serde_json::from_str(&body).map_err(|e| BackendError::Malformed(e.to_string()))?;
        Ok(UploadAck::from_value(raw))
    }
}

async fn read_success_body(response: reqwest::Response) -> Result<String, BackendError> {
    let status = response.status();

    if !status.is_success() {
        // The status is the failure; a body that cannot be read only loses
        // the detail.
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(status = status.as_u16(), "could not read error body: {}", e);
                String::new()
            }
        };
        return Err(BackendError::Status {
            status: status.as_u16(),
            detail: extract_detail(&body),
            body,
        });
    }

    response
        .text()
        .await
        .map_err(|e| BackendError::Transport(format!("reading response body: {}", e)))
}

/// Pull the `detail` field out of an error body. Validation failures carry a
/// structured detail, which is kept as its JSON text.
fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn test_chat_url_escapes_like_encode_uri_component() {
        let client = RagClient::new("http://localhost:8000/");
        assert_eq!(
            client.chat_url("What is RAG?"),
            "http://localhost:8000/chat/What%20is%20RAG%3F"
        );
        assert_eq!(
            client.chat_url("a/b&c=d#e"),
            "http://localhost:8000/chat/a%2Fb%26c%3Dd%23e"
        );
        assert_eq!(
            client.chat_url("keep-_.!~*'()"),
            "http://localhost:8000/chat/keep-_.!~*'()"
        );
        assert_eq!(client.chat_url("café"), "http://localhost:8000/chat/caf%C3%A9");
    }

    #[test]
    fn test_extract_detail() {
        assert_eq!(
            extract_detail(r#"{"detail":"Invalid file type. Please upload a PDF."}"#),
            Some("Invalid file type. Please upload a PDF.".to_string())
        );
        assert_eq!(
            extract_detail(r#"{"detail":[{"loc":["path"],"msg":"bad"}]}"#),
            Some(r#"[{"loc":["path"],"msg":"bad"}]"#.to_string())
        );
        assert_eq!(extract_detail("Internal Server Error"), None);
        assert_eq!(extract_detail(r#"{"error":"x"}"#), None);
    }

    #[test]
    fn test_upload_ack_summary() {
        let ack = UploadAck::from_value(json!({"message": "PDF uploaded and processed successfully"}));
        assert_eq!(ack.summary(), "PDF uploaded and processed successfully");

        let ack = UploadAck::from_value(json!({"ok": true}));
        assert_eq!(ack.message, None);
        assert_eq!(ack.summary(), r#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn test_ask_returns_response_field() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path_contains("/chat/");
                then.status(200)
                    .json_body(json!({"response": "**RAG** is retrieval-augmented generation."}));
            })
            .await;

        let client = RagClient::new(server.base_url());
        let answer = client.ask("What is RAG?").await.unwrap();
        assert_eq!(answer, "**RAG** is retrieval-augmented generation.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_ask_maps_status_with_detail() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path_contains("/chat/");
                then.status(400).json_body(json!({"detail": "Please upload a PDF first"}));
            })
            .await;

        let client = RagClient::new(server.base_url());
        let err = client.ask("hello").await.unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.detail(), Some("Please upload a PDF first"));
    }

    #[tokio::test]
    async fn test_ask_malformed_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path_contains("/chat/");
                then.status(200).json_body(json!({"answer": "wrong field"}));
            })
            .await;

        let client = RagClient::new(server.base_url());
        let err = client.ask("hello").await.unwrap_err();
        assert!(matches!(err, BackendError::Malformed(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_ask_unreachable_is_transport_error() {
        let client = RagClient::new("http://127.0.0.1:1");
        let err = client.ask("hello").await.unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)), "got {err:?}");
    }

    /// Serve one response that announces more body than it sends, then hang up.
    async fn truncated_server(status_line: &str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let head = format!(
            "{}\r\ncontent-type: application/json\r\ncontent-length: 100\r\n\r\n{{\"respon",
            status_line
        );
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_ask_cut_off_body_is_transport_error() {
        let client = RagClient::new(truncated_server("HTTP/1.1 200 OK").await);
        let err = client.ask("hello").await.unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)), "got {err:?}");
        assert!(err.to_string().contains("reading response body"));
    }

    #[tokio::test]
    async fn test_cut_off_error_body_keeps_status() {
        let client = RagClient::new(truncated_server("HTTP/1.1 500 Internal Server Error").await);
        let err = client.ask("hello").await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.detail(), None);
    }

    #[tokio::test]
    async fn test_upload_sends_file_field() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/upload")
                    .body_contains("name=\"file\"")
                    .body_contains("filename=\"notes.pdf\"")
                    .body_contains("%PDF-1.4");
                then.status(200)
                    .json_body(json!({"message": "PDF uploaded and processed successfully"}));
            })
            .await;

        let client = RagClient::new(server.base_url());
        let file = FileHandle::from_bytes("notes.pdf", b"%PDF-1.4 test".to_vec());
        let ack = client.upload(file).await.unwrap();
        assert_eq!(
            ack.message.as_deref(),
            Some("PDF uploaded and processed successfully")
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_failure_carries_detail() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/upload");
                then.status(400)
                    .json_body(json!({"detail": "Invalid file type. Please upload a PDF."}));
            })
            .await;

        let client = RagClient::new(server.base_url());
        let file = FileHandle::from_bytes("notes.txt", b"plain".to_vec());
        let err = client.upload(file).await.unwrap_err();
        assert_eq!(err.detail(), Some("Invalid file type. Please upload a PDF."));
    }

    #[tokio::test]
    async fn test_greet() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/");
                then.status(200).json_body(json!({"greet": "hello"}));
            })
            .await;

        let client = RagClient::new(server.base_url());
        let value = client.greet().await.unwrap();
        assert_eq!(value["greet"], "hello");
    }
}
