//! # Claims Engine Constants
//!
//! All global constants used by the claim, bridge-progress and trading paths.

// ============================================================================
// Network Configuration
// ============================================================================

/// Default bind address for the claims repository / session API
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";

/// Default relay explorer API (message status keyed by source tx hash)
pub const DEFAULT_RELAY_API_URL: &str = "https://scan.layerzero-api.com/v1";

/// Default coin metadata API serving bridge-state snapshots
pub const DEFAULT_COIN_API_URL: &str = "http://127.0.0.1:4000";

/// Default L2 JSON-RPC endpoint
pub const DEFAULT_L2_RPC_URL: &str = "http://127.0.0.1:8545";

/// Chain id of the source chain (L2) that claims are triggered on
pub const DEFAULT_L2_CHAIN_ID: u64 = 8453;

/// Per-request timeout for every outbound HTTP / JSON-RPC call (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 20;

// ============================================================================
// Claim Monitoring
// ============================================================================

/// Interval between two monitor passes (seconds).
/// Stays well under relay explorer rate limits; relay delivery takes minutes.
pub const CLAIM_POLL_INTERVAL_SECS: u64 = 150;

/// Upper bound on claims observed concurrently within one pass
pub const MAX_CONCURRENT_CLAIM_READS: usize = 4;

/// Capacity of the status-change broadcast channel
pub const STATUS_EVENT_CAPACITY: usize = 256;

/// Seconds before a failed lifecycle stage falls back to idle
pub const ERROR_DISMISS_SECS: u64 = 5;

// ============================================================================
// Trading
// ============================================================================

/// Largest slippage tolerance a user may enter (percent)
pub const MAX_SLIPPAGE_PERCENT: u32 = 25;

/// Extra tolerance added on top of the user's bound (percent).
/// Covers price drift between quote and execution.
pub const SLIPPAGE_SAFETY_MARGIN_PERCENT: u32 = 1;

/// Denominator used for slippage arithmetic (per-mille)
pub const SLIPPAGE_DENOMINATOR: u32 = 1000;

/// Quotes older than this are refreshed before building an order (seconds)
pub const QUOTE_FRESHNESS_SECS: u64 = 15;

/// Native currency and bonding-curve token decimals
pub const TOKEN_DECIMALS: u32 = 18;

// ============================================================================
// Repository
// ============================================================================

/// Default page size for claim listings
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Hard cap on page size
pub const MAX_PAGE_SIZE: usize = 100;
