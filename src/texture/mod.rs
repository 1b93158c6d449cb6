//! Capture texture lifecycle
//!
//! Window textures are double-buffered. The engine renders asynchronously
//! into whichever texture pointer is currently bound, so a resize never
//! touches the texture being displayed:
//!
//! ```text
//!   NoTexture ──provision──► Provisioning{front: None, pending}
//!                                 │ WindowCaptured
//!                                 ▼
//!   Provisioning{front, pending} ◄──resize── Stable{front}
//!          │ WindowCaptured                     ▲
//!          └────────── swap ────────────────────┘
//! ```
//!
//! The swap on a completed capture is the only transition that releases the
//! old front texture. Texture objects themselves come from a
//! [`TextureAllocator`]; GPU upload plumbing lives behind that seam.

use crate::engine::TexturePtr;
use crate::error::SessionError;
use log::{debug, error};

/// Identity of one allocated texture object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u64);

/// What a texture is going to hold; allocators pick sampling state from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureUsage {
    Window,
    Icon,
    Cursor,
}

/// A texture owned by the session. Not `Clone`: each one is released to its
/// allocator exactly once.
#[derive(Debug, PartialEq, Eq)]
pub struct Texture {
    id: TextureId,
    width: u32,
    height: u32,
    ptr: TexturePtr,
}

impl Texture {
    pub fn new(id: TextureId, width: u32, height: u32, ptr: TexturePtr) -> Self {
        Self {
            id,
            width,
            height,
            ptr,
        }
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn native_ptr(&self) -> TexturePtr {
        self.ptr
    }
}

/// Creates and destroys GPU textures on behalf of the session.
pub trait TextureAllocator {
    fn allocate(&self, width: u32, height: u32, usage: TextureUsage)
        -> Result<Texture, SessionError>;
    fn release(&self, texture: Texture);
}

/// Coarse phase of a [`TextureSlot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexturePhase {
    NoTexture,
    Provisioning,
    Stable,
}

#[derive(Debug)]
enum TextureState {
    NoTexture,
    Provisioning {
        front: Option<Texture>,
        pending: Texture,
    },
    Stable {
        front: Texture,
    },
}

/// Result of a provisioning attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// A new pending texture was allocated and bound.
    Provisioned,
    /// The current target already has the requested size.
    Unchanged,
    /// The bound texture is still being written by an outstanding capture.
    Deferred,
    /// Zero-sized window; nothing to allocate.
    Skipped,
    /// The allocator refused; the previous state is kept.
    Failed,
}

/// Double-buffered window texture state machine
#[derive(Debug)]
pub struct TextureSlot {
    state: TextureState,
    in_flight: bool,
}

impl TextureSlot {
    pub fn new() -> Self {
        Self {
            state: TextureState::NoTexture,
            in_flight: false,
        }
    }

    pub fn phase(&self) -> TexturePhase {
        match self.state {
            TextureState::NoTexture => TexturePhase::NoTexture,
            TextureState::Provisioning { .. } => TexturePhase::Provisioning,
            TextureState::Stable { .. } => TexturePhase::Stable,
        }
    }

    /// Texture that is safe to sample: sized to the last completed capture.
    pub fn front(&self) -> Option<&Texture> {
        match &self.state {
            TextureState::NoTexture => None,
            TextureState::Provisioning { front, .. } => front.as_ref(),
            TextureState::Stable { front } => Some(front),
        }
    }

    pub fn pending(&self) -> Option<&Texture> {
        match &self.state {
            TextureState::Provisioning { pending, .. } => Some(pending),
            _ => None,
        }
    }

    /// Whether a capture request against the bound pointer is outstanding.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Size the next completed capture will have.
    fn target_size(&self) -> Option<(u32, u32)> {
        match &self.state {
            TextureState::NoTexture => None,
            TextureState::Provisioning { pending, .. } => Some(pending.size()),
            TextureState::Stable { front } => Some(front.size()),
        }
    }

    /// Provision a pending texture when the live size differs from the
    /// current target. `bind` must hand the new pointer to the engine.
    pub fn provision_if_needed(
        &mut self,
        width: u32,
        height: u32,
        allocator: &dyn TextureAllocator,
        bind: impl FnOnce(TexturePtr),
    ) -> ProvisionOutcome {
        if width == 0 || height == 0 {
            return ProvisionOutcome::Skipped;
        }
        if self.target_size() == Some((width, height)) {
            return ProvisionOutcome::Unchanged;
        }
        // The bound pointer, pending or front, stays put until the
        // outstanding capture lands.
        if self.in_flight {
            debug!(
                "Resize to {}x{} postponed until the in-flight capture lands",
                width, height
            );
            return ProvisionOutcome::Deferred;
        }
        self.provision(width, height, allocator, bind)
    }

    /// Discard any pending texture and provision again, regardless of the
    /// current state. Used when the engine reports a texture error.
    pub fn force_reprovision(
        &mut self,
        width: u32,
        height: u32,
        allocator: &dyn TextureAllocator,
        bind: impl FnOnce(TexturePtr),
    ) -> ProvisionOutcome {
        self.in_flight = false;
        self.drop_pending(allocator);
        if width == 0 || height == 0 {
            return ProvisionOutcome::Skipped;
        }
        self.provision(width, height, allocator, bind)
    }

    fn provision(
        &mut self,
        width: u32,
        height: u32,
        allocator: &dyn TextureAllocator,
        bind: impl FnOnce(TexturePtr),
    ) -> ProvisionOutcome {
        let texture = match allocator.allocate(width, height, TextureUsage::Window) {
            Ok(texture) => texture,
            Err(e) => {
                error!("Texture provisioning failed: {}", e);
                return ProvisionOutcome::Failed;
            }
        };

        bind(texture.native_ptr());

        let state = std::mem::replace(&mut self.state, TextureState::NoTexture);
        self.state = match state {
            TextureState::NoTexture => TextureState::Provisioning {
                front: None,
                pending: texture,
            },
            TextureState::Stable { front } => TextureState::Provisioning {
                front: Some(front),
                pending: texture,
            },
            TextureState::Provisioning { front, pending } => {
                allocator.release(pending);
                TextureState::Provisioning {
                    front,
                    pending: texture,
                }
            }
        };
        ProvisionOutcome::Provisioned
    }

    fn drop_pending(&mut self, allocator: &dyn TextureAllocator) {
        let state = std::mem::replace(&mut self.state, TextureState::NoTexture);
        self.state = match state {
            TextureState::Provisioning { front, pending } => {
                allocator.release(pending);
                match front {
                    Some(front) => TextureState::Stable { front },
                    None => TextureState::NoTexture,
                }
            }
            other => other,
        };
    }

    pub fn mark_requested(&mut self) {
        self.in_flight = true;
    }

    /// Apply a completed capture. Returns `true` if the pending texture was
    /// promoted to front.
    pub fn complete_capture(&mut self, allocator: &dyn TextureAllocator) -> bool {
        self.in_flight = false;
        let state = std::mem::replace(&mut self.state, TextureState::NoTexture);
        match state {
            TextureState::Provisioning { front, pending } => {
                if let Some(old) = front {
                    allocator.release(old);
                }
                self.state = TextureState::Stable { front: pending };
                true
            }
            other => {
                self.state = other;
                false
            }
        }
    }

    /// Give every texture back to the allocator.
    pub fn release_all(&mut self, allocator: &dyn TextureAllocator) {
        self.in_flight = false;
        let state = std::mem::replace(&mut self.state, TextureState::NoTexture);
        match state {
            TextureState::NoTexture => {}
            TextureState::Provisioning { front, pending } => {
                if let Some(front) = front {
                    allocator.release(front);
                }
                allocator.release(pending);
            }
            TextureState::Stable { front } => allocator.release(front),
        }
    }
}

impl Default for TextureSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// What consumers see for a window icon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconImage<'a> {
    Captured(&'a Texture),
    /// No icon capture has completed yet.
    Placeholder,
}

/// Single-buffered icon texture
#[derive(Debug, Default)]
pub struct IconSlot {
    texture: Option<Texture>,
    captured: bool,
}

impl IconSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the icon texture once; later calls are no-ops.
    pub fn provision(
        &mut self,
        width: u32,
        height: u32,
        allocator: &dyn TextureAllocator,
        bind: impl FnOnce(TexturePtr),
    ) -> ProvisionOutcome {
        if self.texture.is_some() {
            return ProvisionOutcome::Unchanged;
        }
        if width == 0 || height == 0 {
            return ProvisionOutcome::Skipped;
        }
        match allocator.allocate(width, height, TextureUsage::Icon) {
            Ok(texture) => {
                bind(texture.native_ptr());
                self.texture = Some(texture);
                ProvisionOutcome::Provisioned
            }
            Err(e) => {
                error!("Icon texture provisioning failed: {}", e);
                ProvisionOutcome::Failed
            }
        }
    }

    pub fn mark_captured(&mut self) {
        self.captured = true;
    }

    pub fn has_captured(&self) -> bool {
        self.captured && self.texture.is_some()
    }

    pub fn image(&self) -> IconImage<'_> {
        match (&self.texture, self.captured) {
            (Some(texture), true) => IconImage::Captured(texture),
            _ => IconImage::Placeholder,
        }
    }

    pub fn release(&mut self, allocator: &dyn TextureAllocator) {
        if let Some(texture) = self.texture.take() {
            allocator.release(texture);
        }
        self.captured = false;
    }
}
