//! Grouped statistics over a loaded customer dataset.
//!
//! This module bins ages, computes grouped counts, sums and means with
//! percentage-of-total, builds reindexed cross-tabulations, and summarizes
//! numeric columns and per-segment profiles. Every operation is a pure
//! function of the dataset it is given.

pub mod binning;
pub mod describe;
pub mod engine;
pub mod types;
pub mod utility;
