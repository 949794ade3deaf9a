//! Core infrastructure for colloquy.
//!
//! Provides [`TracingConfig`], which installs the `tracing` subscriber used
//! by applications embedding the conversation engine.
//!
//! # Example
//!
//! ```
//! use colloquy_core::{TracingConfig, TracingFormat};
//! use tracing::Level;
//!
//! TracingConfig::new()
//!     .with_level(Level::DEBUG)
//!     .with_format(TracingFormat::Compact)
//!     .init();
//! ```

/// Tracing subscriber configuration.
pub mod tracing_config;

pub use tracing_config::{FORMAT_ENV, ParseFormatError, TracingConfig, TracingFormat};
