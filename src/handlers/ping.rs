//! Ping handler for health checks
//!
//! Ping is answered without the request envelope so monitoring can use a bare
//! `nats req kidroute.ping '{}'`.

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::services::session::SessionStore;

#[derive(Debug, Default, Serialize, Deserialize)]
struct PingRequest {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PongResponse {
    message: String,
    timestamp: String,
    version: String,
    open_sessions: usize,
}

fn pong(request: PingRequest, open_sessions: usize) -> PongResponse {
    PongResponse {
        message: request.message.map(|m| format!("Pong: {}", m)).unwrap_or_else(|| "Pong".to_string()),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        open_sessions,
    }
}

/// Handle ping messages
pub async fn handle_ping(client: Client, mut subscriber: Subscriber, sessions: Arc<SessionStore>) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received ping message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                error!("Ping message without reply subject");
                continue;
            }
        };

        // An empty body is a valid ping
        let request: PingRequest = if msg.payload.is_empty() {
            PingRequest::default()
        } else {
            match serde_json::from_slice(&msg.payload) {
                Ok(req) => req,
                Err(e) => {
                    error!("Failed to parse ping request: {}", e);
                    let error_response = serde_json::json!({
                        "error": {
                            "code": "INVALID_REQUEST",
                            "message": format!("Failed to parse request: {}", e)
                        }
                    });
                    let _ = client.publish(reply, error_response.to_string().into()).await;
                    continue;
                }
            }
        };

        let response = pong(request, sessions.len());
        client.publish(reply, serde_json::to_vec(&response)?.into()).await?;

        debug!("Sent pong response");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pong_echoes_message() {
        let response = pong(PingRequest { message: Some("hello".to_string()) }, 2);
        assert_eq!(response.message, "Pong: hello");
        assert_eq!(response.open_sessions, 2);
        assert_eq!(response.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_pong_shape() {
        let json = serde_json::to_value(pong(PingRequest::default(), 0)).unwrap();
        assert_eq!(json["message"], "Pong");
        assert_eq!(json["openSessions"], 0);
        assert!(json["timestamp"].is_string());
    }
}
