//! CDP connection: JSON-RPC over the browser's DevTools WebSocket.
//!
//! One writer task drains an outgoing queue into the socket; one reader task
//! routes responses to their waiting caller by message id. Commands for an
//! attached target carry its `sessionId` (flat session mode).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use webexport_core::{Error, Result};

type Waiters = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value>>>>>;

/// A message received from the browser.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// Answer to the command with this id.
    Response { id: u64, result: std::result::Result<Value, String> },
    /// Unsolicited notification.
    Event {
        method: String,
        params: Value,
        session_id: Option<String>,
    },
}

/// Classify one text frame from the browser.
pub fn parse_message(text: &str) -> Result<Incoming> {
    let value: Value = serde_json::from_str(text)?;

    if let Some(id) = value.get("id").and_then(Value::as_u64) {
        let result = match value.get("error") {
            Some(error) => Err(error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown protocol error")
                .to_string()),
            None => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
        };
        return Ok(Incoming::Response { id, result });
    }

    match value.get("method").and_then(Value::as_str) {
        Some(method) => Ok(Incoming::Event {
            method: method.to_string(),
            params: value.get("params").cloned().unwrap_or(Value::Null),
            session_id: value
                .get("sessionId")
                .and_then(Value::as_str)
                .map(str::to_string),
        }),
        None => Err(Error::Cdp(format!("Unrecognized message: {}", text))),
    }
}

/// Build the frame for one command.
pub fn command_frame(id: u64, method: &str, params: Value, session_id: Option<&str>) -> String {
    let mut frame = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    if let Some(session) = session_id {
        frame["sessionId"] = json!(session);
    }
    frame.to_string()
}

pub struct CdpConnection {
    outgoing: mpsc::UnboundedSender<String>,
    waiters: Waiters,
    next_id: AtomicU64,
    closed: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl CdpConnection {
    /// Open the browser-level DevTools socket.
    pub async fn connect(ws_url: &str) -> Result<Self> {
        let (socket, _) = tokio_tungstenite::connect_async(ws_url)
            .await
            .map_err(|e| Error::Cdp(format!("Cannot connect to {}: {}", ws_url, e)))?;
        info!("Connected to DevTools at {}", ws_url);

        let (mut sink, mut stream) = socket.split();
        let (outgoing, mut queue) = mpsc::unbounded_channel::<String>();
        let waiters: Waiters = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let writer = tokio::spawn(async move {
            while let Some(frame) = queue.recv().await {
                if let Err(e) = sink.send(Message::Text(frame)).await {
                    warn!("DevTools write failed: {}", e);
                    break;
                }
            }
        });

        let reader_waiters = waiters.clone();
        let reader_closed = closed.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!("DevTools read failed: {}", e);
                        break;
                    }
                };
                match parse_message(&text) {
                    Ok(Incoming::Response { id, result }) => {
                        if let Some(waiter) = reader_waiters.lock().remove(&id) {
                            let _ = waiter.send(result.map_err(Error::Cdp));
                        }
                    }
                    Ok(Incoming::Event { method, session_id, .. }) => {
                        debug!("DevTools event {} (session {:?})", method, session_id);
                    }
                    Err(e) => warn!("{}", e),
                }
            }

            reader_closed.store(true, Ordering::SeqCst);
            for (_, waiter) in reader_waiters.lock().drain() {
                let _ = waiter.send(Err(Error::Cdp("DevTools connection closed".to_string())));
            }
            info!("DevTools connection closed");
        });

        Ok(Self {
            outgoing,
            waiters,
            next_id: AtomicU64::new(1),
            closed,
            reader,
            writer,
        })
    }

    /// A connection that has already been closed by the browser.
    #[cfg(test)]
    pub(crate) fn closed() -> Self {
        let (outgoing, _) = mpsc::unbounded_channel();
        Self {
            outgoing,
            waiters: Waiters::default(),
            next_id: AtomicU64::new(1),
            closed: Arc::new(AtomicBool::new(true)),
            reader: tokio::spawn(async {}),
            writer: tokio::spawn(async {}),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Send a command and wait for its result.
    pub async fn send(&self, method: &str, params: Value, session_id: Option<&str>) -> Result<Value> {
        if self.is_closed() {
            return Err(Error::Cdp("DevTools connection closed".to_string()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().insert(id, tx);

        debug!("-> {} #{}", method, id);
        if self
            .outgoing
            .send(command_frame(id, method, params, session_id))
            .is_err()
        {
            self.waiters.lock().remove(&id);
            return Err(Error::Cdp("DevTools connection closed".to_string()));
        }

        rx.await
            .map_err(|_| Error::Cdp(format!("No response to {}", method)))?
            .map_err(|e| Error::Cdp(format!("{}: {}", method, e)))
    }
}

impl Drop for CdpConnection {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() {
        let msg = parse_message(r#"{"id":4,"result":{"sessionId":"S1"}}"#).unwrap();
        assert_eq!(
            msg,
            Incoming::Response {
                id: 4,
                result: Ok(json!({"sessionId": "S1"}))
            }
        );
    }

    #[test]
    fn test_parse_error_response() {
        let msg =
            parse_message(r#"{"id":9,"error":{"code":-32000,"message":"Printing failed"}}"#).unwrap();
        assert_eq!(
            msg,
            Incoming::Response {
                id: 9,
                result: Err("Printing failed".to_string())
            }
        );
    }

    #[test]
    fn test_parse_event() {
        let msg = parse_message(
            r#"{"method":"Target.detachedFromTarget","params":{"sessionId":"S1"},"sessionId":"S0"}"#,
        )
        .unwrap();
        let Incoming::Event { method, params, session_id } = msg else {
            panic!("expected event");
        };
        assert_eq!(method, "Target.detachedFromTarget");
        assert_eq!(params["sessionId"], "S1");
        assert_eq!(session_id.as_deref(), Some("S0"));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_message("not json").is_err());
        assert!(parse_message(r#"{"foo":1}"#).is_err());
    }

    #[tokio::test]
    async fn test_closed_connection_refuses_commands() {
        let conn = CdpConnection::closed();
        assert!(conn.is_closed());
        let err = conn.send("Runtime.evaluate", json!({}), Some("S1")).await.unwrap_err();
        assert_eq!(err.to_string(), "CDP error: DevTools connection closed");
    }

    #[test]
    fn test_command_frame() {
        let frame: Value =
            serde_json::from_str(&command_frame(2, "Page.printToPDF", json!({}), Some("S1"))).unwrap();
        assert_eq!(
            frame,
            json!({"id": 2, "method": "Page.printToPDF", "params": {}, "sessionId": "S1"})
        );

        let frame: Value =
            serde_json::from_str(&command_frame(3, "Target.getTargets", json!({}), None)).unwrap();
        assert!(frame.get("sessionId").is_none());
    }
}
