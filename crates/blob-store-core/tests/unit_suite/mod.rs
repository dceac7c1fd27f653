//! Unit tests for blob-store-core.
//!
//! Every test in `store_contract` and `pagination` runs once per backend.

pub mod atomicity;
pub mod helpers;
pub mod pagination;
pub mod store_contract;
