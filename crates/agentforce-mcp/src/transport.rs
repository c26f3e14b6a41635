//! MCP Transport layer implementations

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};

/// Header carrying the session id assigned by streamable-HTTP servers
const SESSION_HEADER: &str = "mcp-session-id";

/// Transport trait for MCP communication
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&mut self, message: Value) -> io::Result<()>;
    /// Next inbound message, or `None` once the peer has nothing more to say
    async fn receive(&mut self) -> io::Result<Option<Value>>;
    async fn close(&mut self) -> io::Result<()>;
}

#[async_trait]
impl Transport for Box<dyn Transport> {
    async fn send(&mut self, message: Value) -> io::Result<()> {
        (**self).send(message).await
    }

    async fn receive(&mut self) -> io::Result<Option<Value>> {
        (**self).receive().await
    }

    async fn close(&mut self) -> io::Result<()> {
        (**self).close().await
    }
}

/// Stdio transport for subprocess communication
///
/// Messages are newline-delimited JSON on the child's stdin and stdout.
pub struct StdioTransport {
    child: Child,
    reader: BufReader<ChildStdout>,
}

impl StdioTransport {
    pub async fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> io::Result<Self> {
        let mut child = Command::new(command)
            .args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("Failed to capture stdout"))?;

        Ok(Self {
            child,
            reader: BufReader::new(stdout),
        })
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&mut self, message: Value) -> io::Result<()> {
        let stdin = self
            .child
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::other("Stdin not available"))?;

        let json = serde_json::to_string(&message)?;
        stdin.write_all(json.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;

        Ok(())
    }

    async fn receive(&mut self) -> io::Result<Option<Value>> {
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line).await? == 0 {
                return Ok(None);
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            // Some servers print log lines on stdout
            match serde_json::from_str::<Value>(trimmed) {
                Ok(value) => return Ok(Some(value)),
                Err(_) => {
                    tracing::debug!(line = trimmed, "Skipping non-JSON line from MCP server");
                }
            }
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        // Closing stdin lets well-behaved servers exit on their own
        drop(self.child.stdin.take());
        match self.child.try_wait()? {
            Some(_) => Ok(()),
            None => self.child.kill().await,
        }
    }
}

/// HTTP transport: each message is POSTed and the reply body is queued
///
/// Replies may be plain JSON or a `text/event-stream` body whose `data:`
/// lines carry JSON messages.
pub struct HttpTransport {
    url: String,
    client: reqwest::Client,
    session_id: Option<String>,
    inbox: VecDeque<Value>,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
            session_id: None,
            inbox: VecDeque::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&mut self, message: Value) -> io::Result<()> {
        let mut request = self
            .client
            .post(&self.url)
            .header(reqwest::header::ACCEPT, "application/json, text/event-stream")
            .json(&message);
        if let Some(session) = &self.session_id {
            request = request.header(SESSION_HEADER, session);
        }

        let response = request.send().await.map_err(io::Error::other)?;

        let status = response.status();
        if !status.is_success() {
            return Err(io::Error::other(format!("HTTP {} from {}", status, self.url)));
        }

        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            self.session_id = Some(session.to_string());
        }

        let is_event_stream = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));

        let body = response.text().await.map_err(io::Error::other)?;
        if is_event_stream {
            self.inbox.extend(parse_event_stream(&body));
        } else if !body.trim().is_empty() {
            // Notifications are acknowledged with 202 and an empty body
            let value: Value = serde_json::from_str(&body)?;
            match value {
                Value::Array(batch) => self.inbox.extend(batch),
                single => self.inbox.push_back(single),
            }
        }

        Ok(())
    }

    async fn receive(&mut self) -> io::Result<Option<Value>> {
        Ok(self.inbox.pop_front())
    }

    async fn close(&mut self) -> io::Result<()> {
        if let Some(session) = self.session_id.take() {
            // Best effort; servers may not support explicit termination
            let _ = self
                .client
                .delete(&self.url)
                .header(SESSION_HEADER, session)
                .send()
                .await;
        }
        Ok(())
    }
}

/// JSON messages from the `data:` fields of a server-sent events body
pub fn parse_event_stream(body: &str) -> Vec<Value> {
    let mut messages = Vec::new();
    let mut data = String::new();

    let mut flush = |data: &mut String| {
        if !data.is_empty() {
            match serde_json::from_str::<Value>(data) {
                Ok(value) => messages.push(value),
                Err(e) => tracing::debug!(error = %e, "Ignoring non-JSON SSE event"),
            }
            data.clear();
        }
    };

    for line in body.lines() {
        if line.is_empty() {
            flush(&mut data);
        } else if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    flush(&mut data);

    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_event_stream() {
        let body = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n\n\
                    : keep-alive\n\
                    data: {\"jsonrpc\":\"2.0\",\n\
                    data: \"method\":\"notifications/progress\"}\n";
        let messages = parse_event_stream(body);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["id"], 1);
        assert_eq!(messages[1]["method"], "notifications/progress");
    }

    #[test]
    fn test_parse_event_stream_skips_garbage() {
        assert!(parse_event_stream("data: not json\n\n").is_empty());
        assert!(parse_event_stream("").is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdio_round_trip_through_cat() {
        let mut transport = StdioTransport::spawn("cat", &[], &HashMap::new()).await.unwrap();
        let message = json!({"jsonrpc": "2.0", "id": 1, "method": "ping"});

        transport.send(message.clone()).await.unwrap();
        assert_eq!(transport.receive().await.unwrap(), Some(message));

        transport.close().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdio_skips_log_lines() {
        let args = vec![
            "-c".to_string(),
            r#"echo "starting server"; echo ""; echo '{"jsonrpc":"2.0","id":1,"result":{}}'"#.to_string(),
        ];
        let mut transport = StdioTransport::spawn("sh", &args, &HashMap::new()).await.unwrap();

        let value = transport.receive().await.unwrap().unwrap();
        assert_eq!(value["id"], 1);
        assert_eq!(transport.receive().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_http_receive_empty_inbox() {
        let mut transport = HttpTransport::new("http://127.0.0.1:9/mcp");
        assert_eq!(transport.url(), "http://127.0.0.1:9/mcp");
        assert_eq!(transport.receive().await.unwrap(), None);
    }
}
