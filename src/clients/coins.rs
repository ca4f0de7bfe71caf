use super::{trim_base, BridgeStateSource};
use crate::chain::BridgeState;
use crate::error::ProviderError;
use async_trait::async_trait;

/// Reads bridge-deployment snapshots from the coin API.
#[derive(Clone)]
pub struct HttpBridgeStateSource {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBridgeStateSource {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: trim_base(base_url),
        }
    }
}

#[async_trait]
impl BridgeStateSource for HttpBridgeStateSource {
    async fn bridge_state(&self, coin_id: &str) -> Result<BridgeState, ProviderError> {
        let url = format!("{}/coins/{}/bridge-state", self.base_url, coin_id);
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::new(
                Some(response.status().as_u16() as i64),
                format!("coin API returned {} for {}", response.status(), coin_id),
            ));
        }
        Ok(response.json::<BridgeState>().await?)
    }
}
