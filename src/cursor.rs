//! Cursor Tracker
//!
//! Same request/complete pattern as a window, applied to the mouse cursor
//! image. The cursor has a single texture and no hierarchy.

use crate::engine::{CaptureEngine, Point};
use crate::scheduler::Cadence;
use crate::signal::{Signal, SubscriptionId};
use crate::texture::{Texture, TextureAllocator, TextureUsage};
use log::{debug, error};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct CursorEvents {
    pub captured: Signal<()>,
    /// Fired after the cursor texture was replaced by one of a new size.
    pub texture_changed: Signal<()>,
}

pub struct CursorState {
    engine: Arc<dyn CaptureEngine>,
    texture: Option<Texture>,
    cadence: Option<Cadence>,
    events: CursorEvents,
}

impl CursorState {
    /// `frame_rate: None` disables periodic cursor captures.
    pub(crate) fn new(engine: Arc<dyn CaptureEngine>, frame_rate: Option<f32>) -> Self {
        Self {
            engine,
            texture: None,
            cadence: frame_rate.map(Cadence::new),
            events: CursorEvents::default(),
        }
    }

    pub fn position(&self) -> Point {
        self.engine.cursor_position()
    }

    pub fn size(&self) -> (u32, u32) {
        self.engine.cursor_size()
    }

    pub fn texture(&self) -> Option<&Texture> {
        self.texture.as_ref()
    }

    pub fn events_mut(&mut self) -> &mut CursorEvents {
        &mut self.events
    }

    pub fn on_captured(&mut self, f: impl FnMut(&()) + 'static) -> SubscriptionId {
        self.events.captured.subscribe(f)
    }

    pub fn on_texture_changed(&mut self, f: impl FnMut(&()) + 'static) -> SubscriptionId {
        self.events.texture_changed.subscribe(f)
    }

    /// Make sure a texture of the current cursor size is bound, then ask
    /// the engine for a capture.
    pub(crate) fn request_capture(&mut self, allocator: &dyn TextureAllocator) {
        let (width, height) = self.engine.cursor_size();
        if width == 0 || height == 0 {
            return;
        }

        let current = self.texture.as_ref().map(Texture::size);
        if current != Some((width, height)) {
            match allocator.allocate(width, height, TextureUsage::Cursor) {
                Ok(texture) => {
                    self.engine.bind_cursor_texture_pointer(texture.native_ptr());
                    if let Some(old) = self.texture.replace(texture) {
                        allocator.release(old);
                    }
                    debug!("Cursor texture re-provisioned at {}x{}", width, height);
                    self.events.texture_changed.emit(&());
                }
                Err(e) => {
                    error!("Cursor texture provisioning failed: {}", e);
                    return;
                }
            }
        }

        self.engine.request_capture_cursor();
    }

    /// Periodic capture cadence; `false` when cursor capture is disabled.
    pub(crate) fn advance(&mut self, dt: f32) -> bool {
        self.cadence
            .as_mut()
            .map(|cadence| cadence.advance(dt))
            .unwrap_or(false)
    }

    pub(crate) fn handle_captured(&mut self) {
        self.events.captured.emit(&());
    }

    pub(crate) fn release(&mut self, allocator: &dyn TextureAllocator) {
        if let Some(texture) = self.texture.take() {
            allocator.release(texture);
        }
    }
}

impl fmt::Debug for CursorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CursorState")
            .field("texture", &self.texture)
            .field("cadence", &self.cadence)
            .field("events", &self.events)
            .finish()
    }
}
