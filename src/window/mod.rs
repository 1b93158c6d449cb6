//! Window entities
//!
//! A [`WindowEntity`] is the managed proxy for one OS window or desktop
//! surface. Identity, the parent link and the textures live here; every
//! other property (geometry, title, flags, ...) is read from the capture
//! engine on demand and never cached.
//!
//! Once the engine reports a window removed, the entity is marked dead.
//! Reads against a dead entity never reach the engine and return a fixed
//! "unavailable" value: empty strings, zero-sized rectangles, default flags
//! and no texture.

use crate::engine::{
    CaptureEngine, CaptureMode, CapturePriority, NativeHandle, Point, Rectangle, WindowFlags,
    WindowId,
};
use crate::signal::{Signal, SubscriptionId};
use crate::texture::{
    IconImage, IconSlot, ProvisionOutcome, Texture, TextureAllocator, TexturePhase, TextureSlot,
};
use log::debug;
use std::fmt;
use std::sync::Arc;

/// Role of a window, fixed at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowKind {
    /// Top-level window without a linked parent.
    Window,
    /// Root background surface, tracked in the registry's desktop list.
    Desktop,
    /// Window linked to a parent at registration.
    Child,
}

/// Parent link recorded at creation.
///
/// The handle is kept next to the id so that an id recycled by the engine
/// never resolves to an unrelated window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentLink {
    pub id: WindowId,
    pub handle: NativeHandle,
}

/// Per-window notifications, fired synchronously during message dispatch
#[derive(Debug, Default)]
pub struct WindowEvents {
    pub captured: Signal<WindowEntity>,
    pub size_changed: Signal<WindowEntity>,
    pub icon_captured: Signal<WindowEntity>,
    /// Receives the newly linked child.
    pub child_added: Signal<WindowEntity>,
    /// Receives the removed (already dead) child.
    pub child_removed: Signal<WindowEntity>,
}

pub struct WindowEntity {
    id: WindowId,
    handle: NativeHandle,
    parent: Option<ParentLink>,
    kind: WindowKind,
    alive: bool,
    engine: Arc<dyn CaptureEngine>,
    texture: TextureSlot,
    icon: IconSlot,
    events: WindowEvents,
}

impl WindowEntity {
    pub(crate) fn new(
        id: WindowId,
        handle: NativeHandle,
        parent: Option<ParentLink>,
        kind: WindowKind,
        engine: Arc<dyn CaptureEngine>,
    ) -> Self {
        Self {
            id,
            handle,
            parent,
            kind,
            alive: true,
            engine,
            texture: TextureSlot::new(),
            icon: IconSlot::new(),
            events: WindowEvents::default(),
        }
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn handle(&self) -> NativeHandle {
        self.handle
    }

    pub fn kind(&self) -> WindowKind {
        self.kind
    }

    /// Raw parent link. It may name a window that has since been removed;
    /// resolve it through the registry.
    pub fn parent_link(&self) -> Option<ParentLink> {
        self.parent
    }

    pub fn parent_id(&self) -> Option<WindowId> {
        self.parent.map(|link| link.id)
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_child(&self) -> bool {
        self.parent.is_some()
    }

    /// Alive and still known to the engine.
    pub fn is_valid(&self) -> bool {
        self.alive && self.engine.window_exists(self.id)
    }

    // Live properties

    pub fn title(&self) -> String {
        if !self.alive {
            return String::new();
        }
        self.engine.window_title(self.id)
    }

    pub fn class_name(&self) -> String {
        if !self.alive {
            return String::new();
        }
        self.engine.window_class_name(self.id)
    }

    /// Raw OS frame.
    pub fn raw_rect(&self) -> Rectangle {
        if !self.alive {
            return Rectangle::default();
        }
        self.engine.window_rect(self.id)
    }

    /// Captured area: raw position shifted by the texture offset, sized like
    /// the texture the engine renders.
    pub fn rect(&self) -> Rectangle {
        if !self.alive {
            return Rectangle::default();
        }
        let raw = self.engine.window_rect(self.id);
        let offset = self.engine.window_texture_offset(self.id);
        let (width, height) = self.engine.window_texture_size(self.id);
        Rectangle::from_loc_and_size((raw.x + offset.x, raw.y + offset.y), (width, height))
    }

    pub fn width(&self) -> u32 {
        self.live_size().0
    }

    pub fn height(&self) -> u32 {
        self.live_size().1
    }

    fn live_size(&self) -> (u32, u32) {
        if !self.alive {
            return (0, 0);
        }
        self.engine.window_texture_size(self.id)
    }

    pub fn texture_offset(&self) -> Point {
        if !self.alive {
            return Point::default();
        }
        self.engine.window_texture_offset(self.id)
    }

    /// Z-order, 0 being the top-most window. Dead windows report 0.
    pub fn z_order(&self) -> i32 {
        if !self.alive {
            return 0;
        }
        self.engine.window_z_order(self.id)
    }

    pub fn process_id(&self) -> u32 {
        if !self.alive {
            return 0;
        }
        self.engine.window_process_id(self.id)
    }

    pub fn thread_id(&self) -> u32 {
        if !self.alive {
            return 0;
        }
        self.engine.window_thread_id(self.id)
    }

    pub fn owner_handle(&self) -> NativeHandle {
        if !self.alive {
            return NativeHandle::NULL;
        }
        self.engine.window_owner_handle(self.id)
    }

    pub fn flags(&self) -> WindowFlags {
        if !self.alive {
            return WindowFlags::default();
        }
        self.engine.window_flags(self.id)
    }

    pub fn is_visible(&self) -> bool {
        self.flags().visible
    }

    pub fn is_minimized(&self) -> bool {
        self.flags().minimized
    }

    pub fn is_maximized(&self) -> bool {
        self.flags().maximized
    }

    pub fn is_alt_tab_window(&self) -> bool {
        self.flags().alt_tab
    }

    pub fn is_desktop(&self) -> bool {
        self.kind == WindowKind::Desktop
    }

    pub fn icon_size(&self) -> (u32, u32) {
        if !self.alive {
            return (0, 0);
        }
        self.engine.window_icon_size(self.id)
    }

    /// BGRA32 pixels of the latest capture.
    pub fn pixels(&self, x: i32, y: i32, width: u32, height: u32) -> Option<Vec<u8>> {
        if !self.alive {
            return None;
        }
        self.engine.window_pixels(self.id, x, y, width, height)
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<[u8; 4]> {
        let bytes = self.pixels(x, y, 1, 1)?;
        match bytes.as_slice() {
            [b, g, r, a, ..] => Some([*b, *g, *r, *a]),
            _ => None,
        }
    }

    // Capture configuration

    pub fn capture_mode(&self) -> CaptureMode {
        if !self.alive {
            return CaptureMode::None;
        }
        self.engine.window_capture_mode(self.id)
    }

    pub fn set_capture_mode(&self, mode: CaptureMode) {
        if self.alive {
            self.engine.set_window_capture_mode(self.id, mode);
        }
    }

    pub fn cursor_draw(&self) -> bool {
        self.alive && self.engine.window_cursor_draw(self.id)
    }

    pub fn set_cursor_draw(&self, draw: bool) {
        if self.alive {
            self.engine.set_window_cursor_draw(self.id, draw);
        }
    }

    pub fn request_update_title(&self) {
        if self.alive {
            self.engine.request_update_title(self.id);
        }
    }

    // Textures

    /// Texture ready for sampling, sized to the last completed capture.
    pub fn texture(&self) -> Option<&Texture> {
        if !self.alive {
            return None;
        }
        self.texture.front()
    }

    /// Size of [`WindowEntity::texture`], `(0, 0)` when unavailable.
    pub fn texture_size(&self) -> (u32, u32) {
        self.texture().map(Texture::size).unwrap_or((0, 0))
    }

    pub fn pending_texture(&self) -> Option<&Texture> {
        if !self.alive {
            return None;
        }
        self.texture.pending()
    }

    pub fn texture_phase(&self) -> TexturePhase {
        self.texture.phase()
    }

    pub fn icon(&self) -> IconImage<'_> {
        if !self.alive {
            return IconImage::Placeholder;
        }
        self.icon.image()
    }

    pub fn has_icon(&self) -> bool {
        self.alive && self.icon.has_captured()
    }

    // Events

    pub fn events_mut(&mut self) -> &mut WindowEvents {
        &mut self.events
    }

    pub fn on_captured(&mut self, f: impl FnMut(&WindowEntity) + 'static) -> SubscriptionId {
        self.events.captured.subscribe(f)
    }

    pub fn on_size_changed(&mut self, f: impl FnMut(&WindowEntity) + 'static) -> SubscriptionId {
        self.events.size_changed.subscribe(f)
    }

    pub fn on_icon_captured(
        &mut self,
        f: impl FnMut(&WindowEntity) + 'static,
    ) -> SubscriptionId {
        self.events.icon_captured.subscribe(f)
    }

    pub fn on_child_added(&mut self, f: impl FnMut(&WindowEntity) + 'static) -> SubscriptionId {
        self.events.child_added.subscribe(f)
    }

    pub fn on_child_removed(
        &mut self,
        f: impl FnMut(&WindowEntity) + 'static,
    ) -> SubscriptionId {
        self.events.child_removed.subscribe(f)
    }

    // Session-internal transitions

    /// Provision a pending texture when the live size no longer matches.
    pub(crate) fn prepare_texture(&mut self, allocator: &dyn TextureAllocator) -> ProvisionOutcome {
        let (width, height) = self.engine.window_texture_size(self.id);
        let engine = &self.engine;
        let id = self.id;
        self.texture
            .provision_if_needed(width, height, allocator, |ptr| engine.bind_texture_pointer(id, ptr))
    }

    /// Bind a texture of the current size, then ask the engine for a capture.
    /// Returns `false` for dead windows and when no texture of the current
    /// size could be bound; the engine is not asked in either case.
    pub(crate) fn request_capture(
        &mut self,
        priority: CapturePriority,
        allocator: &dyn TextureAllocator,
    ) -> bool {
        if !self.alive {
            return false;
        }
        match self.prepare_texture(allocator) {
            ProvisionOutcome::Failed | ProvisionOutcome::Skipped => {
                debug!("Window {} has no texture to capture into; request skipped", self.id);
                return false;
            }
            ProvisionOutcome::Provisioned
            | ProvisionOutcome::Unchanged
            | ProvisionOutcome::Deferred => {}
        }
        let priority = match priority {
            CapturePriority::Auto => CapturePriority::High,
            explicit => explicit,
        };
        self.engine.request_capture(self.id, priority);
        self.texture.mark_requested();
        true
    }

    pub(crate) fn request_capture_icon(&self) -> bool {
        if !self.alive {
            return false;
        }
        self.engine.request_capture_icon(self.id);
        true
    }

    pub(crate) fn provision_icon(&mut self, allocator: &dyn TextureAllocator) {
        let (width, height) = self.engine.window_icon_size(self.id);
        let engine = &self.engine;
        let id = self.id;
        self.icon
            .provision(width, height, allocator, |ptr| engine.bind_icon_texture_pointer(id, ptr));
    }

    /// `WindowCaptured`: swap textures if a resize was pending, then notify.
    pub(crate) fn handle_captured(&mut self, allocator: &dyn TextureAllocator) {
        if self.texture.complete_capture(allocator) {
            debug!(
                "Window {} now displays a {}x{} texture",
                self.id,
                self.texture_size().0,
                self.texture_size().1
            );
        }
        self.emit(EventKind::Captured);
    }

    pub(crate) fn handle_size_changed(&mut self) {
        self.emit(EventKind::SizeChanged);
    }

    pub(crate) fn handle_icon_captured(&mut self) {
        self.icon.mark_captured();
        self.emit(EventKind::IconCaptured);
    }

    /// Texture null/size error: provision again no matter what state we are in.
    pub(crate) fn reset_texture(&mut self, allocator: &dyn TextureAllocator) {
        let (width, height) = self.engine.window_texture_size(self.id);
        let engine = &self.engine;
        let id = self.id;
        self.texture
            .force_reprovision(width, height, allocator, |ptr| engine.bind_texture_pointer(id, ptr));
    }

    pub(crate) fn mark_dead(&mut self) {
        self.alive = false;
    }

    pub(crate) fn release_textures(&mut self, allocator: &dyn TextureAllocator) {
        self.texture.release_all(allocator);
        self.icon.release(allocator);
    }

    pub(crate) fn emit_child_added(&mut self, child: &WindowEntity) {
        let mut signal = std::mem::take(&mut self.events.child_added);
        signal.emit(child);
        self.events.child_added = signal;
    }

    pub(crate) fn emit_child_removed(&mut self, child: &WindowEntity) {
        let mut signal = std::mem::take(&mut self.events.child_removed);
        signal.emit(child);
        self.events.child_removed = signal;
    }

    fn emit(&mut self, kind: EventKind) {
        let mut signal = std::mem::take(kind.signal(&mut self.events));
        signal.emit(self);
        *kind.signal(&mut self.events) = signal;
    }
}

/// Self-notifications an entity fires with itself as the argument
#[derive(Debug, Clone, Copy)]
enum EventKind {
    Captured,
    SizeChanged,
    IconCaptured,
}

impl EventKind {
    fn signal(self, events: &mut WindowEvents) -> &mut Signal<WindowEntity> {
        match self {
            EventKind::Captured => &mut events.captured,
            EventKind::SizeChanged => &mut events.size_changed,
            EventKind::IconCaptured => &mut events.icon_captured,
        }
    }
}

impl fmt::Debug for WindowEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowEntity")
            .field("id", &self.id)
            .field("handle", &self.handle)
            .field("parent", &self.parent)
            .field("kind", &self.kind)
            .field("alive", &self.alive)
            .field("texture", &self.texture)
            .field("icon", &self.icon)
            .finish()
    }
}

#[cfg(test)]
mod tests;
