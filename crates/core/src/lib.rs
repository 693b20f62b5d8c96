//! Core library: scanning, probing, preview generation, tagging, reconciliation.

pub mod artifacts;
pub mod cache;
pub mod candidates;
pub mod classifier;
pub mod config;
pub mod models;
pub mod pipeline;
pub mod probe;
pub mod reconcile;
pub mod report;
pub mod scanner;
pub mod transcode;
