//! Line-oriented terminal client over the same chat workflow as the window.

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use rag_desk::backend::{Backend, RagClient};
use rag_desk::chat::ChatOutcome;
use rag_desk::config::Config;
use rag_desk::error::BackendError;
use rag_desk::session::Session;

const EXIT_WORDS: [&str; 3] = ["quit", "bye", "exit"];

pub async fn run(config: Config) -> Result<()> {
    let client = RagClient::new(config.backend.base_url.clone());
    if let Err(e) = client.greet().await {
        tracing::warn!(url = client.base_url(), "backend did not answer: {}", e);
    }

    let mut session = Session::new(&config);
    let backend: Arc<dyn Backend> = Arc::new(client);
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();

    run_with_io(&mut session, backend, stdin, &mut stdout).await
}

pub async fn run_with_io<R, W>(
    session: &mut Session,
    backend: Arc<dyn Backend>,
    reader: R,
    writer: &mut W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    loop {
        writer.write_all(b"Enter your query: ").await?;
        writer.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        if EXIT_WORDS.contains(&line.trim().to_lowercase().as_str()) {
            writer.write_all(b"Exiting the chat...\n").await?;
            break;
        }

        session.set_query_input(line);
        let Ok(pending) = session.submit_input() else {
            continue;
        };

        let reply = pending.run(backend.clone()).await;
        let output = match session.complete_query(reply) {
            ChatOutcome::Answered(index) => {
                let answer = session
                    .exchanges()
                    .get(index)
                    .map(|e| e.response.as_str())
                    .unwrap_or_default();
                format!("Response: {}\n", answer)
            }
            ChatOutcome::Failed(BackendError::Status { status, body, .. }) => {
                format!("Error: {}\n{}\n", status, body)
            }
            ChatOutcome::Failed(err) => format!("Error: {}\n", err),
            ChatOutcome::Ignored => continue,
        };
        writer.write_all(output.as_bytes()).await?;
    }

    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rag_desk::backend::UploadAck;
    use rag_desk::ingest::FileHandle;

    struct Echo {
        fail: bool,
    }

    #[async_trait]
    impl Backend for Echo {
        async fn ask(&self, query: &str) -> Result<String, BackendError> {
            if self.fail {
                return Err(BackendError::Status {
                    status: 500,
                    detail: Some("boom".to_string()),
                    body: r#"{"detail":"boom"}"#.to_string(),
                });
            }
            Ok(format!("echo: {}", query))
        }

        async fn upload(&self, _file: FileHandle) -> Result<UploadAck, BackendError> {
            unreachable!("the terminal client never uploads")
        }
    }

    async fn drive(input: &str, fail: bool) -> (Session, String) {
        let mut session = Session::new(&Config::default());
        let mut out: Vec<u8> = Vec::new();
        run_with_io(
            &mut session,
            Arc::new(Echo { fail }),
            input.as_bytes(),
            &mut out,
        )
        .await
        .unwrap();
        (session, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_answers_until_exit_word() {
        let (session, out) = drive("What is RAG?\n\nBye\nnever sent\n", false).await;

        assert!(out.contains("Response: echo: What is RAG?\n"));
        assert!(out.ends_with("Exiting the chat...\n"));
        assert!(!out.contains("never sent"));
        assert_eq!(session.exchanges().len(), 1);
    }

    #[tokio::test]
    async fn test_stops_at_end_of_input() {
        let (session, out) = drive("one\ntwo", false).await;
        assert!(out.contains("Response: echo: one\n"));
        assert!(out.contains("Response: echo: two\n"));
        assert_eq!(session.exchanges().len(), 2);
    }

    #[tokio::test]
    async fn test_prints_status_and_body_on_failure() {
        let (session, out) = drive("hello\nquit\n", true).await;
        assert!(out.contains("Error: 500\n{\"detail\":\"boom\"}\n"));
        assert!(session.exchanges().is_empty());
    }
}
