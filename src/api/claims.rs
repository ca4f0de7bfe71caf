//! Claims repository handlers.

use super::error_response;
use crate::chain::NewClaim;
use crate::claims::{ClaimQuery, ClaimsRepository, StatusUpdate, UpdateStatusRequest};
use crate::error::ClaimError;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;

pub async fn create_claim(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewClaim>,
) -> impl IntoResponse {
    if payload.owner_id.trim().is_empty()
        || payload.coin_id.trim().is_empty()
        || payload.transaction_hash.trim().is_empty()
    {
        return (
            StatusCode::BAD_REQUEST,
            "ownerId, coinId and transactionHash are required",
        )
            .into_response();
    }

    match state.storage.create(payload).await {
        Ok(claim) => {
            // New records join the running session.
            state.monitor.track(claim.clone());
            (StatusCode::CREATED, Json(claim)).into_response()
        }
        Err(e) => error_response(&e),
    }
}

pub async fn list_claims(
    State(state): State<Arc<AppState>>,
    Query(mut query): Query<ClaimQuery>,
) -> impl IntoResponse {
    if query.limit.is_none() {
        query.limit = Some(state.settings.page_size);
    }
    if let Some(cursor) = &query.cursor {
        if cursor.parse::<usize>().is_err() {
            return (StatusCode::BAD_REQUEST, "Invalid cursor").into_response();
        }
    }
    match state.storage.list(&query).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn get_claim(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.storage.get(&id).await {
        Ok(Some(claim)) => Json(claim).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Claim not found").into_response(),
        Err(e) => error_response(&e),
    }
}

/// `expectedStatus` makes the write conditional; a mismatch answers 409 with the stored claim.
pub async fn update_claim_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateStatusRequest>,
) -> impl IntoResponse {
    let result: Result<StatusUpdate, ClaimError> = state
        .storage
        .update_status(&id, payload.expected_status, payload.status)
        .await;
    match result {
        Ok(StatusUpdate::Applied(claim)) => {
            log::info!("Claim {} set to {} via API", claim.id, claim.status);
            Json(claim).into_response()
        }
        Ok(StatusUpdate::Conflict(claim)) => (StatusCode::CONFLICT, Json(claim)).into_response(),
        Ok(StatusUpdate::NotFound) => (StatusCode::NOT_FOUND, "Claim not found").into_response(),
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{body_json, state};
    use crate::chain::ClaimStatus;

    fn new_claim(owner: &str, coin: &str, tx: &str) -> NewClaim {
        NewClaim {
            owner_id: owner.to_string(),
            coin_id: coin.to_string(),
            coin_address: format!("0x{}", coin),
            transaction_hash: tx.to_string(),
        }
    }

    async fn post(state: &Arc<AppState>, claim: NewClaim) -> axum::response::Response {
        create_claim(State(state.clone()), Json(claim))
            .await
            .into_response()
    }

    async fn put_status(
        state: &Arc<AppState>,
        id: &str,
        status: ClaimStatus,
        expected_status: Option<ClaimStatus>,
    ) -> axum::response::Response {
        update_claim_status(
            State(state.clone()),
            Path(id.to_string()),
            Json(UpdateStatusRequest {
                status,
                expected_status,
            }),
        )
        .await
        .into_response()
    }

    #[tokio::test]
    async fn test_create_is_idempotent_and_refuses_second_open_claim() {
        let state = state();
        let created = post(&state, new_claim("0xowner", "c1", "0xaa")).await;
        assert_eq!(created.status(), StatusCode::CREATED);
        let first = body_json(created).await;
        assert_eq!(first["status"], "IN_PROGRESS");

        let again = post(&state, new_claim("0xowner", "c1", "0xaa")).await;
        assert_eq!(again.status(), StatusCode::CREATED);
        assert_eq!(body_json(again).await["id"], first["id"]);

        let duplicate = post(&state, new_claim("0xOWNER", "c1", "0xbb")).await;
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(duplicate).await["kind"], "ClaimInProgress");

        let missing = post(&state, new_claim("", "c1", "0xcc")).await;
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_status_writes_are_conditional_and_final() {
        let state = state();
        let claim = body_json(post(&state, new_claim("0xowner", "c1", "0xaa")).await).await;
        let id = claim["id"].as_str().unwrap().to_string();

        let stale = put_status(&state, &id, ClaimStatus::Failed, Some(ClaimStatus::Received)).await;
        assert_eq!(stale.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(stale).await["status"], "IN_PROGRESS");

        let applied =
            put_status(&state, &id, ClaimStatus::Received, Some(ClaimStatus::InProgress)).await;
        assert_eq!(applied.status(), StatusCode::OK);

        let regress = put_status(&state, &id, ClaimStatus::InProgress, None).await;
        assert_eq!(regress.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(regress).await["status"], "RECEIVED");

        let missing = put_status(&state, "nope", ClaimStatus::Failed, None).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_listing_and_lookup() {
        let state = state();
        for i in 0..3 {
            post(&state, new_claim("0xowner", &format!("c{}", i), &format!("0x{}", i))).await;
        }

        let mut query = ClaimQuery::for_owner("0xOwner");
        query.limit = Some(2);
        let page = list_claims(State(state.clone()), Query(query.clone()))
            .await
            .into_response();
        assert_eq!(page.status(), StatusCode::OK);
        let page = body_json(page).await;
        assert_eq!(page["claims"].as_array().unwrap().len(), 2);
        assert_eq!(page["nextCursor"], "2");

        query.cursor = Some("next".to_string());
        let bad = list_claims(State(state.clone()), Query(query))
            .await
            .into_response();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let missing = get_claim(State(state.clone()), Path("nope".to_string()))
            .await
            .into_response();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
