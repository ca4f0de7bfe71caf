//! # Trading
//!
//! Slippage-bounded order construction around the external pricing calls.

pub mod quote;
pub mod slippage;

pub use quote::{Quote, QuoteService};
pub use slippage::{
    minimum_output, SlippageOrderBuilder, SlippageTolerance, TradeOrder, TradeSide, Venue,
};
