//! WebSocket mock of the OpenAI Realtime API
//!
//! Accepts connections on a random local port, records the handshake
//! request and every text event it receives, and answers according to a
//! [`RealtimeBehavior`].

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

use super::Captured;

/// What the mock does after accepting a connection.
#[derive(Clone, Debug)]
pub enum RealtimeBehavior {
    /// Send `session.created`, then push `events` once the greeting arrives
    SessionCreated { events: Vec<Value> },
    /// Send an `error` event instead of `session.created`
    ErrorEvent { error_type: String, message: String },
    /// Refuse the WebSocket handshake with this HTTP status
    RejectHandshake(u16),
    /// Accept and never say anything
    Silent,
}

/// Handshake details seen by the mock.
#[derive(Clone, Debug)]
pub struct SeenRequest {
    pub uri: String,
    pub authorization: Option<String>,
    pub openai_beta: Option<String>,
}

pub struct MockRealtimeServer {
    pub url: String,
    pub requests: Captured<SeenRequest>,
    pub received: Captured<Value>,
}

impl MockRealtimeServer {
    /// Start the mock on 127.0.0.1 with a random port.
    pub async fn start(behavior: RealtimeBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let requests: Captured<SeenRequest> = Arc::new(Mutex::new(Vec::new()));
        let received: Captured<Value> = Arc::new(Mutex::new(Vec::new()));

        let (req_slot, recv_slot) = (requests.clone(), received.clone());
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let behavior = behavior.clone();
                let requests = req_slot.clone();
                let received = recv_slot.clone();
                tokio::spawn(async move {
                    let _ = handle_connection(stream, behavior, requests, received).await;
                });
            }
        });

        Self {
            url: format!("ws://{}/v1/realtime", addr),
            requests,
            received,
        }
    }

    /// Event types received so far, in order.
    pub async fn received_types(&self) -> Vec<String> {
        self.received
            .lock()
            .await
            .iter()
            .filter_map(|event| event["type"].as_str().map(str::to_string))
            .collect()
    }
}

async fn handle_connection(
    stream: TcpStream,
    behavior: RealtimeBehavior,
    requests: Captured<SeenRequest>,
    received: Captured<Value>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let reject = match &behavior {
        RealtimeBehavior::RejectHandshake(status) => Some(*status),
        _ => None,
    };

    let mut seen = None;
    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let header = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        seen = Some(SeenRequest {
            uri: request.uri().to_string(),
            authorization: header("authorization"),
            openai_beta: header("openai-beta"),
        });

        match reject {
            Some(status) => {
                let mut error = ErrorResponse::new(Some("rejected".to_string()));
                *error.status_mut() = http::StatusCode::from_u16(status).unwrap();
                Err(error)
            }
            None => Ok(response),
        }
    };

    let ws = accept_hdr_async(stream, callback).await;
    if let Some(seen) = seen {
        requests.lock().await.push(seen);
    }
    let mut ws = ws?;

    match behavior {
        RealtimeBehavior::SessionCreated { events } => {
            let created = json!({
                "type": "session.created",
                "event_id": "event_1",
                "session": {
                    "id": "sess_mock",
                    "object": "realtime.session",
                    "model": "gpt-4o-realtime-preview-2024-12-17",
                    "voice": "alloy"
                }
            });
            ws.send(Message::Text(created.to_string().into())).await?;

            let mut pending_events = Some(events);
            while let Some(message) = ws.next().await {
                match message? {
                    Message::Text(text) => {
                        let event: Value = serde_json::from_str(text.as_str())?;
                        let is_greeting = event["type"] == "response.create";
                        received.lock().await.push(event);

                        if is_greeting && let Some(events) = pending_events.take() {
                            for event in events {
                                ws.send(Message::Text(event.to_string().into())).await?;
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
        RealtimeBehavior::ErrorEvent {
            error_type,
            message,
        } => {
            let error = json!({
                "type": "error",
                "event_id": "event_1",
                "error": {
                    "type": error_type,
                    "code": "invalid_value",
                    "message": message
                }
            });
            ws.send(Message::Text(error.to_string().into())).await?;
            while let Some(Ok(_)) = ws.next().await {}
        }
        RealtimeBehavior::Silent => while let Some(Ok(_)) = ws.next().await {},
        RealtimeBehavior::RejectHandshake(_) => {}
    }

    Ok(())
}
