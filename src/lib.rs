//! # winmirror
//!
//! Managed session layer for live OS window mirroring. A native capture
//! engine enumerates windows and copies their pixels asynchronously; this
//! crate turns the engine's message stream into a queryable window tree
//! with double-buffered capture textures.
//!
//! ## Architecture
//!
//! - `engine`: contract with the native capture engine, plus a headless engine
//! - `texture`: texture allocation seam and the double-buffer state machine
//! - `window`: window entities and their per-window notifications
//! - `registry`: id-keyed window map, hierarchy resolution, searches
//! - `scheduler`: capture cadence, timing and priority policy
//! - `cursor`: cursor image tracking
//! - `session`: the per-tick driver and message dispatcher
//! - `config`: configuration parsing and management
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use winmirror::engine::headless::HeadlessEngine;
//! use winmirror::{Session, SessionConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let engine = Arc::new(HeadlessEngine::with_demo_windows(3));
//!     let mut session = Session::new(SessionConfig::default(), engine.clone(), engine)?;
//!
//!     session.on_window_added(|window| println!("added {}", window.title()));
//!     session.update(1.0 / 60.0);
//!
//!     if let Some(id) = session.find_by_title("Window", true).map(|w| w.id()) {
//!         session.schedule_default(id);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod signal;
pub mod texture;
pub mod window;

// Re-export main types for easy access
pub use config::SessionConfig;
pub use engine::{CaptureEngine, CapturePriority, Message, MessageKind, WindowId};
pub use error::SessionError;
pub use registry::Registry;
pub use scheduler::{CaptureSchedule, CaptureTiming};
pub use session::{CommandQueue, Session, SessionCommand, TickReport};
pub use texture::{Texture, TextureAllocator};
pub use window::{WindowEntity, WindowKind};

/// Version information for winmirror
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
