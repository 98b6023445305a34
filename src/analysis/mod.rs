//! Sales analysis.
//!
//! This module turns raw CRM deals into the per-owner leaderboard.

pub mod aggregator;

pub use aggregator::*;
