//! # colloquy Internal Library
//!
//! Re-exports the core colloquy crates for convenience.

/// Layer 1: Unidirectional state store.
pub use colloquy_store;

/// Layer 2: Conversation graph and engine.
pub use colloquy_graph;

/// Tracing subscriber configuration.
pub use colloquy_core;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use colloquy_core::{TracingConfig, TracingFormat};
    pub use colloquy_graph::prelude::*;
    pub use colloquy_store::prelude::*;
}
