//! Interactive surface and logging setup for the `vidprep` binary.
pub mod logging;
pub mod prompt;
