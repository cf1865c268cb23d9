//! StrataDB common types, errors, and configuration.
//!
//! This crate provides shared definitions used across all StrataDB components.

pub mod config;
pub mod error;
pub mod page;

pub use config::{BTreeConfig, CostParams, StrataConfig, TierConfig, MAX_POSTING_REFS};
pub use error::{Result, StrataError};
pub use page::{PageHeader, PageId, PageType, RelationId, PAGE_SIZE};
