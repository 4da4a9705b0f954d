//! Top-level facade crate for carelink.
//!
//! Re-exports the core primitives and the pipeline library so users can depend on a single crate.

pub mod core {
    pub use carelink_core::*;
}

pub mod pipeline {
    pub use carelink_pipeline::*;
}
