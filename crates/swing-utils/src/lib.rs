//! Shared utilities for swing-rs
//!
//! This crate provides common functionality used across the swing-rs workspace:
//! logging setup and environment loading.

pub mod env;
pub mod logging;

pub use env::{env_string, load_dotenv};
pub use logging::{LogFormat, init_tracing_with};
