use super::{trim_base, RelayStatusSource};
use crate::chain::RelayMessageStatus;
use crate::error::ProviderError;
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Deserialize, Debug)]
struct ExplorerResponse {
    #[serde(default)]
    data: Vec<ExplorerMessage>,
}

#[derive(Deserialize, Debug)]
struct ExplorerMessage {
    status: ExplorerStatus,
}

#[derive(Deserialize, Debug)]
struct ExplorerStatus {
    name: String,
}

/// Relay explorer client, keyed by the source transaction hash.
#[derive(Clone)]
pub struct ExplorerRelayClient {
    http: reqwest::Client,
    base_url: String,
}

impl ExplorerRelayClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: trim_base(base_url),
        }
    }
}

/// Maps an explorer status name. Anything not final counts as in flight.
pub fn map_explorer_status(name: &str) -> RelayMessageStatus {
    match name.trim().to_ascii_uppercase().as_str() {
        "DELIVERED" => RelayMessageStatus::Delivered,
        "FAILED" | "BLOCKED" | "MALFORMED_COMMAND" | "UNRESOLVABLE_COMMAND" => {
            RelayMessageStatus::Failed
        }
        _ => RelayMessageStatus::Inflight,
    }
}

#[async_trait]
impl RelayStatusSource for ExplorerRelayClient {
    async fn message_status(&self, tx_hash: &str) -> Result<RelayMessageStatus, ProviderError> {
        let url = format!("{}/messages/tx/{}", self.base_url, tx_hash);
        let response = self.http.get(&url).send().await?;

        // Freshly submitted messages are not indexed yet.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(RelayMessageStatus::Inflight);
        }
        if !response.status().is_success() {
            return Err(ProviderError::new(
                Some(response.status().as_u16() as i64),
                format!("relay explorer returned {} for {}", response.status(), tx_hash),
            ));
        }

        let body: ExplorerResponse = response.json().await?;
        Ok(body
            .data
            .first()
            .map(|m| map_explorer_status(&m.status.name))
            .unwrap_or(RelayMessageStatus::Inflight))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(map_explorer_status("DELIVERED"), RelayMessageStatus::Delivered);
        assert_eq!(map_explorer_status("failed"), RelayMessageStatus::Failed);
        assert_eq!(map_explorer_status("BLOCKED"), RelayMessageStatus::Failed);
        assert_eq!(map_explorer_status("CONFIRMING"), RelayMessageStatus::Inflight);
        assert_eq!(map_explorer_status("PAYLOAD_STORED"), RelayMessageStatus::Inflight);
    }

    #[test]
    fn test_explorer_payload() {
        let body: ExplorerResponse =
            serde_json::from_str(r#"{"data":[{"status":{"name":"INFLIGHT","message":"x"},"guid":"0x1"}]}"#)
                .unwrap();
        assert_eq!(body.data[0].status.name, "INFLIGHT");
        let empty: ExplorerResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.data.is_empty());
    }
}
