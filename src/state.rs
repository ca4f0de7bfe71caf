use crate::bridge::BridgeProgressTracker;
use crate::claims::{ClaimStatusMonitor, MonitorEvent};
use crate::storage::Storage;
use crate::utils::constants::{
    CLAIM_POLL_INTERVAL_SECS, DEFAULT_COIN_API_URL, DEFAULT_L2_CHAIN_ID, DEFAULT_L2_RPC_URL,
    DEFAULT_LISTEN_ADDR, DEFAULT_PAGE_SIZE, DEFAULT_RELAY_API_URL,
    QUOTE_FRESHNESS_SECS, REQUEST_TIMEOUT_SECS,
};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Key of the settings record in the settings table.
pub const SETTINGS_KEY: &str = "app_settings";

const DEFAULT_DB_PATH: &str = "data/claims.redb";

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AppSettings {
    pub listen_addr: String,
    pub db_path: String,
    pub relay_api_url: String,
    /// Remote claims repository. Empty means this node's own store.
    pub repository_url: String,
    pub coin_api_url: String,
    pub l2_rpc_url: String,
    pub l2_chain_id: u64,
    pub bridge_address: String,
    pub bonding_curve_address: String,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub quote_freshness_secs: u64,
    pub page_size: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            db_path: DEFAULT_DB_PATH.to_string(),
            relay_api_url: DEFAULT_RELAY_API_URL.to_string(),
            repository_url: String::new(),
            coin_api_url: DEFAULT_COIN_API_URL.to_string(),
            l2_rpc_url: DEFAULT_L2_RPC_URL.to_string(),
            l2_chain_id: DEFAULT_L2_CHAIN_ID,
            bridge_address: String::new(),
            bonding_curve_address: String::new(),
            poll_interval_secs: CLAIM_POLL_INTERVAL_SECS,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            quote_freshness_secs: QUOTE_FRESHNESS_SECS,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl AppSettings {
    /// Stored settings, or defaults when the record is missing or unreadable.
    pub fn load(storage: &Storage) -> Self {
        match storage.get_setting(SETTINGS_KEY) {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
                log::warn!("Stored settings unreadable, using defaults: {}", e);
                Self::default()
            }),
            Ok(None) => Self::default(),
            Err(e) => {
                log::warn!("Could not read settings: {}", e);
                Self::default()
            }
        }
    }

    pub fn save(&self, storage: &Storage) -> Result<(), anyhow::Error> {
        storage.save_setting(SETTINGS_KEY, &serde_json::to_string(self)?)
    }

    /// Applies `CLAIMS_*` environment overrides.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup("CLAIMS_LISTEN_ADDR") {
            self.listen_addr = v;
        }
        if let Some(v) = lookup("CLAIMS_DB_PATH") {
            self.db_path = v;
        }
        if let Some(v) = lookup("CLAIMS_L2_RPC_URL") {
            self.l2_rpc_url = v;
        }
        if let Some(v) = lookup("CLAIMS_RELAY_API_URL") {
            self.relay_api_url = v;
        }
        self
    }
}

// Shared state for the API
pub struct AppState {
    pub storage: Arc<Storage>,
    pub monitor: Arc<ClaimStatusMonitor>,
    pub tracker: Arc<BridgeProgressTracker>,
    pub evt_sender: broadcast::Sender<MonitorEvent>,
    pub settings: AppSettings,
}
