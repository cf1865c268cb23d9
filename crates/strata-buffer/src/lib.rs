//! Page frame latching for StrataDB.
//!
//! This crate provides in-memory page frames with:
//! - Pin counting for concurrent access
//! - A reader/writer latch over the page bytes
//! - Dirty tracking for pages modified under an exclusive latch
//! - RAII guards that release latch and pin on every exit path

mod frame;
mod guard;

pub use frame::BufferFrame;
pub use guard::{FrameReadGuard, FrameWriteGuard};
