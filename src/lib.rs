//! Static energy hotspot scanning and remote code execution with provider fallback.

pub mod analyzers;
pub mod broker;
pub mod config;
pub mod error;
pub mod measurement;
pub mod providers;
pub mod reporters;
pub mod scoring;
pub mod service;
pub mod types;

pub use error::{Error, Result};
