//! # HTTP API
//!
//! Claims repository surface backed by the local store, plus the session
//! endpoints the presentation layer reads: claimable coins, retryable
//! claims, bridge progress and the live status event stream.

pub mod claims;
pub mod session;

use crate::error::{ClaimError, ErrorBody, ErrorKind};
use crate::state::AppState;
use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![Method::GET, Method::POST, Method::PUT])
        .allow_headers(Any);

    Router::new()
        .route("/claims", post(claims::create_claim).get(claims::list_claims))
        .route("/claims/:id", get(claims::get_claim))
        .route("/claims/:id/status", put(claims::update_claim_status))
        .route("/session/claimable", get(session::get_claimable))
        .route("/session/retryable", get(session::get_retryable))
        .route("/coins/:id/progress", get(session::get_progress))
        .route("/ws", get(session::websocket_handler))
        .layer(cors)
        .with_state(state)
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::ClaimInProgress => StatusCode::CONFLICT,
        ErrorKind::InvalidAmount | ErrorKind::InvalidSlippage => StatusCode::BAD_REQUEST,
        ErrorKind::RepositoryUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn error_response(err: &ClaimError) -> Response {
    (status_for(err.kind()), Json(ErrorBody::from(err))).into_response()
}
