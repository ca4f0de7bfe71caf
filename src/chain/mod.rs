//! # Cross-Chain Data Structures
//!
//! Core types: Coin, BridgeState, Claim, relay observations and amounts.

pub mod claim;
pub mod coin;
pub mod units;

pub use claim::*;
pub use coin::*;
pub use units::*;
