//! Storage layer: the tag ledger.
//!
//! The ledger is a flat CSV table mapping a video id to its ranked tag list.

pub mod ledger;

pub use ledger::{load, save, LedgerError, TagRecord, LEDGER_HEADER, MAX_TAGS, MEDIA_TYPE_VIDEO};
