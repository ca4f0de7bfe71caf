//! Session views: claimable coins, retryable claims, bridge progress and
//! the WebSocket status feed.

use super::error_response;
use crate::chain::Claim;
use crate::claims::{is_retryable, ClaimQuery, ClaimsRepository};
use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerParams {
    owner_id: Option<String>,
}

pub async fn get_claimable(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OwnerParams>,
) -> impl IntoResponse {
    let mut coins = state.monitor.claimable_coins();
    if let Some(owner) = &params.owner_id {
        coins.retain(|c| c.owner_id.eq_ignore_ascii_case(owner));
    }
    Json(coins)
}

pub async fn get_retryable(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OwnerParams>,
) -> impl IntoResponse {
    let Some(owner) = params.owner_id else {
        return (StatusCode::BAD_REQUEST, "ownerId is required").into_response();
    };
    match state.storage.list_all(&ClaimQuery::for_owner(&owner)).await {
        Ok(history) => {
            let retryable: Vec<Claim> = history
                .iter()
                .filter(|c| is_retryable(c, &history))
                .cloned()
                .collect();
            Json(retryable).into_response()
        }
        Err(e) => error_response(&e),
    }
}

pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Path(coin_id): Path<String>,
) -> impl IntoResponse {
    Json(state.tracker.get_progress(&coin_id).await)
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| websocket_connection(socket, state))
}

async fn websocket_connection(mut socket: WebSocket, state: Arc<AppState>) {
    let mut rx = state.evt_sender.subscribe();

    // Current claimable set first, so late subscribers start in sync.
    let snapshot = crate::claims::MonitorEvent::ClaimableCoins(state.monitor.claimable_coins());
    if let Ok(json) = serde_json::to_string(&snapshot) {
        if let Err(e) = socket.send(Message::Text(json)).await {
            log::error!("WS send error: {}", e);
            return;
        }
    }

    loop {
        match rx.recv().await {
            Ok(event) => {
                if let Ok(json) = serde_json::to_string(&event) {
                    if socket.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                log::warn!("WS subscriber lagged, {} events dropped", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
