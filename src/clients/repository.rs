use super::trim_base;
use crate::chain::{Claim, ClaimStatus, NewClaim};
use crate::claims::repository::{
    ClaimPage, ClaimQuery, ClaimsRepository, StatusUpdate, UpdateStatusRequest,
};
use crate::error::{ClaimError, ErrorBody};
use async_trait::async_trait;
use reqwest::StatusCode;

/// Client for a remote ClaimsRepository HTTP surface.
#[derive(Clone)]
pub struct HttpClaimsRepository {
    http: reqwest::Client,
    base_url: String,
}

impl HttpClaimsRepository {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: trim_base(base_url),
        }
    }
}

fn unavailable(e: reqwest::Error) -> ClaimError {
    ClaimError::RepositoryUnavailable(e.to_string())
}

async fn error_from_response(response: reqwest::Response) -> ClaimError {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(body) => ClaimError::RepositoryUnavailable(format!("{}: {}", status, body.message)),
        Err(_) => ClaimError::RepositoryUnavailable(format!("repository returned {}", status)),
    }
}

#[async_trait]
impl ClaimsRepository for HttpClaimsRepository {
    async fn create(&self, new: NewClaim) -> Result<Claim, ClaimError> {
        let response = self
            .http
            .post(format!("{}/claims", self.base_url))
            .json(&new)
            .send()
            .await
            .map_err(unavailable)?;
        if response.status() == StatusCode::CONFLICT {
            return Err(ClaimError::ClaimInProgress {
                coin_id: new.coin_id,
            });
        }
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        response.json::<Claim>().await.map_err(unavailable)
    }

    async fn get(&self, id: &str) -> Result<Option<Claim>, ClaimError> {
        let response = self
            .http
            .get(format!("{}/claims/{}", self.base_url, id))
            .send()
            .await
            .map_err(unavailable)?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(response.json().await.map_err(unavailable)?)),
            _ => Err(error_from_response(response).await),
        }
    }

    async fn list(&self, query: &ClaimQuery) -> Result<ClaimPage, ClaimError> {
        let response = self
            .http
            .get(format!("{}/claims", self.base_url))
            .query(query)
            .send()
            .await
            .map_err(unavailable)?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        response.json::<ClaimPage>().await.map_err(unavailable)
    }

    async fn update_status(
        &self,
        id: &str,
        expected: Option<ClaimStatus>,
        status: ClaimStatus,
    ) -> Result<StatusUpdate, ClaimError> {
        let response = self
            .http
            .put(format!("{}/claims/{}/status", self.base_url, id))
            .json(&UpdateStatusRequest {
                status,
                expected_status: expected,
            })
            .send()
            .await
            .map_err(unavailable)?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(StatusUpdate::NotFound),
            StatusCode::CONFLICT => Ok(StatusUpdate::Conflict(
                response.json().await.map_err(unavailable)?,
            )),
            s if s.is_success() => Ok(StatusUpdate::Applied(
                response.json().await.map_err(unavailable)?,
            )),
            _ => Err(error_from_response(response).await),
        }
    }
}
