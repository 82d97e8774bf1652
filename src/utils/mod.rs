//! Utility modules: benchmark event sink.
pub mod devlog;
