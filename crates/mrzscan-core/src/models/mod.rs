//! Data models for configuration and results.

pub mod config;
pub mod result;

pub use config::{ScanConfig, ScanMode, ScanOptions};
pub use result::{DocumentSide, RecogResult};
