//! Run outputs: fingerprints, the JSONL run log, chart series and CSV export.

pub mod hasher;
pub mod log;
pub mod series;
