//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching incoming commands and forwarding filtered claim updates.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{WsCommand, WsMessage, WsMessageType};
use super::subscription::SubscriptionManager;
use crate::domain::{ClaimId, ClaimUpdate};
use crate::service::ClaimService;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and dispatches them.
/// - Forwards matching updates from the [`broadcast::Receiver`] to the client.
pub async fn run_connection(
    socket: WebSocket,
    mut update_rx: broadcast::Receiver<ClaimUpdate>,
    claim_service: Arc<ClaimService>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text_message(text.as_str(), &mut subs, &claim_service).await;
                        let json = serde_json::to_string(&reply).unwrap_or_default();
                        if ws_tx.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            update = update_rx.recv() => {
                match update {
                    Ok(update) => {
                        if subs.matches(&update) {
                            let msg = WsMessage::new(
                                uuid::Uuid::new_v4().to_string(),
                                WsMessageType::Event,
                                serde_json::to_value(&update).unwrap_or_default(),
                            );
                            let json = serde_json::to_string(&msg).unwrap_or_default();
                            if ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

/// Splits requested claim ids into parsed ids and the wildcard flag;
/// unparseable ids are ignored.
fn parse_claim_ids(raw: &[String]) -> (Vec<ClaimId>, bool) {
    let wildcard = raw.iter().any(|s| s == "*");
    let ids = raw
        .iter()
        .filter(|s| s.as_str() != "*")
        .filter_map(|s| s.parse::<ClaimId>().ok())
        .collect();
    (ids, wildcard)
}

fn respond<T: serde::Serialize>(id: String, payload: &T) -> WsMessage {
    WsMessage::new(
        id,
        WsMessageType::Response,
        serde_json::to_value(payload).unwrap_or_default(),
    )
}

/// Handles a text frame from the client and builds the reply.
async fn handle_text_message(
    text: &str,
    subs: &mut SubscriptionManager,
    claim_service: &ClaimService,
) -> WsMessage {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return WsMessage::error(String::new(), 400, "malformed JSON");
    };
    if msg.msg_type != WsMessageType::Command {
        return WsMessage::error(msg.id, 400, "expected a command message");
    }
    let Ok(command) = serde_json::from_value::<WsCommand>(msg.payload) else {
        return WsMessage::error(msg.id, 404, "unknown command");
    };

    match command {
        WsCommand::Subscribe {
            claim_ids,
            correlation_ids,
        } => {
            let (ids, wildcard) = parse_claim_ids(&claim_ids);
            subs.subscribe(&ids, &correlation_ids, wildcard);
            respond(
                msg.id,
                &serde_json::json!({
                    "subscribed": ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "correlation_ids": correlation_ids,
                    "count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        WsCommand::Unsubscribe {
            claim_ids,
            correlation_ids,
        } => {
            let (ids, wildcard) = parse_claim_ids(&claim_ids);
            subs.unsubscribe(&ids, &correlation_ids, wildcard);
            respond(
                msg.id,
                &serde_json::json!({
                    "unsubscribed": ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "remaining_count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        WsCommand::GetClaim { claim_id } => {
            let Ok(claim_id) = claim_id.parse::<ClaimId>() else {
                return WsMessage::error(msg.id, 400, "invalid claim id");
            };
            match claim_service.find_claim(&claim_id).await {
                Ok(event) => respond(msg.id, &event),
                Err(e) => WsMessage::error(msg.id, e.status_code().as_u16(), &e.to_string()),
            }
        }
        WsCommand::GetSnapshot => respond(msg.id, &claim_service.snapshot().await),
        WsCommand::GetSubmission { correlation_id } => {
            match claim_service.submission(&correlation_id).await {
                Ok(entry) => respond(msg.id, &entry),
                Err(e) => WsMessage::error(msg.id, e.status_code().as_u16(), &e.to_string()),
            }
        }
    }
}
