//! Error types for the capture session
//!
//! Tick-time code never surfaces these to callers: asynchronous capture
//! races are ignored and texture failures are retried on the next request.
//! They appear only at setup (engine initialization) and at the texture
//! allocator seam.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    /// The native capture engine could not be initialized or has gone away.
    #[error("capture engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The texture allocator refused to create a texture.
    #[error("failed to allocate {width}x{height} texture: {reason}")]
    TextureAllocation {
        width: u32,
        height: u32,
        reason: String,
    },
}
