//! # Coin Types
//!
//! Tradable assets and their bridge-deployment state as served by the coin API.

use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Coin {
    pub id: String,
    pub l2_address: String,
    /// Only set once bridge deployment reached its terminal step.
    pub l1_address: Option<String>,
    pub bonding_curve_progress: u8,
    pub created_at: DateTime<Utc>,
}

impl Coin {
    pub fn is_migrated(&self) -> bool {
        self.l1_address.is_some()
    }
}

/// Fixed, ordered bridge-deployment steps.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BridgeStep {
    LockLiquidity,
    BridgeTransfer,
    DeployL1,
    SeedPool,
    Finalize,
}

impl BridgeStep {
    pub const ALL: [BridgeStep; 5] = [
        BridgeStep::LockLiquidity,
        BridgeStep::BridgeTransfer,
        BridgeStep::DeployL1,
        BridgeStep::SeedPool,
        BridgeStep::Finalize,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// Ordered: a status never compares lower after the step advanced.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "camelCase")]
pub enum StepStatus {
    #[default]
    Pending,
    InProgress,
    WaitingForGas,
    Completed,
}

/// Gas prices observed for a step that is waiting on gas. Display only.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GasStatus {
    #[serde(with = "crate::serde_helpers::biguint_string")]
    pub current_gas_price: BigUint,
    #[serde(with = "crate::serde_helpers::biguint_string")]
    pub target_gas_price: BigUint,
}

/// Payload of `GET /coins/{id}/bridge-state`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BridgeState {
    #[serde(default, deserialize_with = "known_steps")]
    pub steps: BTreeMap<BridgeStep, StepStatus>,
    #[serde(default)]
    pub gas_status: Option<GasStatus>,
}

impl BridgeState {
    pub fn status_of(&self, step: BridgeStep) -> StepStatus {
        self.steps.get(&step).copied().unwrap_or_default()
    }
}

/// Keeps the steps this build knows about; newer keys or statuses are dropped.
fn known_steps<'de, D>(deserializer: D) -> Result<BTreeMap<BridgeStep, StepStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(key, value)| {
            let step = serde_json::from_value::<BridgeStep>(Value::String(key.clone()));
            match (step, serde_json::from_value::<StepStatus>(value)) {
                (Ok(step), Ok(status)) => Some((step, status)),
                _ => {
                    log::debug!("Ignoring unrecognised bridge step entry {}", key);
                    None
                }
            }
        })
        .collect())
}
