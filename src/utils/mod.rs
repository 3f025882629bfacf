//! Shared helpers

pub mod error;

pub use error::{CompositorError, CompositorResult, ErrorResponse};
