//! A directed conversation engine: intent-driven graph traversal over a
//! unidirectional action store.
//!

pub use colloquy_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use colloquy_internal::prelude::*;
}
