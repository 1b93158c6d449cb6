//! Capture Session
//!
//! The session is the explicit owner of everything the managed layer keeps:
//! the engine and texture allocator handles, the window registry, the
//! capture scheduler, the cursor tracker and the deferred command queue.
//! The host application drives it by calling [`Session::update`] once per
//! tick; nothing runs in between.
//!
//! Tick order:
//! 1. apply commands queued by listeners during the previous tick
//! 2. advance the engine
//! 3. refresh the window under the cursor
//! 4. drain the engine's message queue and dispatch every message in order
//! 5. request title refreshes per the configured timing
//! 6. issue scheduled captures
//! 7. issue a cursor capture if one is due

mod dispatch;

use crate::config::{SessionConfig, TitleUpdateTiming};
use crate::cursor::CursorState;
use crate::engine::{
    CaptureEngine, CapturePriority, NativeHandle, Point, Rectangle, WindowId,
};
use crate::registry::Registry;
use crate::scheduler::{resolve_priority, CaptureSchedule, CaptureScheduler, DueCapture};
use crate::signal::{Signal, SubscriptionId};
use crate::texture::TextureAllocator;
use crate::window::WindowEntity;
use anyhow::{Context, Result};
use log::{debug, info, trace, warn};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Follow-up work requested from a listener. Applied at the start of the
/// next tick, never during dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    RequestCapture {
        id: WindowId,
        priority: CapturePriority,
    },
    RequestCaptureIcon(WindowId),
    /// `None` uses the configured default schedule.
    Schedule {
        id: WindowId,
        schedule: Option<CaptureSchedule>,
    },
    Unschedule(WindowId),
    MarkVisible(WindowId),
}

/// Cloneable handle to the session's deferred command queue
#[derive(Debug, Clone, Default)]
pub struct CommandQueue {
    inner: Arc<Mutex<VecDeque<SessionCommand>>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, command: SessionCommand) {
        self.inner.lock().push_back(command);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    fn drain(&self) -> Vec<SessionCommand> {
        self.inner.lock().drain(..).collect()
    }
}

/// Registry-level notifications
#[derive(Debug, Default)]
pub struct SessionEvents {
    pub window_added: Signal<WindowEntity>,
    /// Receives the removed, already dead, entity.
    pub window_removed: Signal<WindowEntity>,
    pub desktop_added: Signal<WindowEntity>,
    pub desktop_removed: Signal<WindowEntity>,
}

/// What one [`Session::update`] did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub commands_applied: usize,
    pub messages: usize,
    pub windows_added: usize,
    pub windows_removed: usize,
    pub captures_completed: usize,
    pub texture_errors: usize,
    /// Messages dropped because their window was no longer registered.
    pub ignored: usize,
    pub capture_requests: usize,
}

pub struct Session {
    config: SessionConfig,
    engine: Arc<dyn CaptureEngine>,
    allocator: Arc<dyn TextureAllocator>,
    registry: Registry,
    scheduler: CaptureScheduler,
    cursor: CursorState,
    commands: CommandQueue,
    events: SessionEvents,
    engine_available: bool,
}

impl Session {
    /// Validate `config` and initialize the engine.
    ///
    /// An engine that fails to initialize does not fail the session; it
    /// degrades to an empty registry and every tick becomes a no-op.
    pub fn new(
        config: SessionConfig,
        engine: Arc<dyn CaptureEngine>,
        allocator: Arc<dyn TextureAllocator>,
    ) -> Result<Self> {
        config.validate().context("Invalid session configuration")?;

        let engine_available = match engine.initialize() {
            Ok(()) => {
                info!("🪟 Capture engine initialized");
                true
            }
            Err(e) => {
                warn!("⚠️ {}; continuing with an empty registry", e);
                false
            }
        };

        let cursor_rate = config.cursor.capture.then_some(config.cursor.frame_rate);
        let cursor = CursorState::new(engine.clone(), cursor_rate);

        Ok(Self {
            config,
            engine,
            allocator,
            registry: Registry::new(),
            scheduler: CaptureScheduler::new(),
            cursor,
            commands: CommandQueue::new(),
            events: SessionEvents::default(),
            engine_available,
        })
    }

    /// Run one tick. `dt` is the time since the previous tick in seconds.
    pub fn update(&mut self, dt: f32) -> TickReport {
        let mut report = TickReport::default();
        if !self.engine_available {
            return report;
        }

        for command in self.commands.drain() {
            self.apply_command(command);
            report.commands_applied += 1;
        }

        self.engine.update(dt);
        self.registry
            .set_cursor_window(self.engine.window_id_under_cursor());

        let messages = self.engine.messages();
        self.engine.clear_messages();
        for message in messages {
            dispatch::dispatch(self, message, &mut report);
        }

        match self.config.titles.update_timing {
            TitleUpdateTiming::Manual => {}
            TitleUpdateTiming::AllWindows => self.update_all_window_titles(),
            TitleUpdateTiming::AltTabWindows => self.update_alt_tab_window_titles(),
        }

        for due in self.scheduler.advance(dt) {
            if self.issue(due) {
                report.capture_requests += 1;
            }
        }

        if self.cursor.advance(dt) {
            self.cursor.request_capture(self.allocator.as_ref());
        }

        if report.messages > 0 {
            trace!("Tick: {:?}", report);
        }
        report
    }

    fn apply_command(&mut self, command: SessionCommand) {
        debug!("Applying deferred {:?}", command);
        match command {
            SessionCommand::RequestCapture { id, priority } => {
                self.request_capture(id, priority);
            }
            SessionCommand::RequestCaptureIcon(id) => {
                self.request_capture_icon(id);
            }
            SessionCommand::Schedule { id, schedule } => {
                let schedule = schedule.unwrap_or_else(|| self.config.default_schedule());
                self.schedule(id, schedule);
            }
            SessionCommand::Unschedule(id) => {
                self.unschedule(id);
            }
            SessionCommand::MarkVisible(id) => {
                self.mark_visible(id);
            }
        }
    }

    fn issue(&mut self, due: DueCapture) -> bool {
        let Some(window) = self.registry.get(due.id) else {
            return false;
        };
        window.set_capture_mode(due.mode);
        window.set_cursor_draw(due.draw_cursor);
        self.request_capture(due.id, due.priority)
    }

    /// Priority the policy assigns to `id` for `requested`.
    pub fn resolve_priority(&self, id: WindowId, requested: CapturePriority) -> CapturePriority {
        if requested != CapturePriority::Auto {
            return requested;
        }
        let under_cursor = self.registry.cursor_window_id() == Some(id);
        let z_order = self.registry.get(id).map(WindowEntity::z_order).unwrap_or(0);
        resolve_priority(
            requested,
            under_cursor,
            z_order,
            self.config.capture.middle_priority_max_z,
        )
    }

    /// Bind a texture of the window's current size and request a capture.
    /// `Auto` applies the cursor/z-order policy. Returns `false` (and does
    /// nothing) for unknown or dead windows.
    pub fn request_capture(&mut self, id: WindowId, priority: CapturePriority) -> bool {
        let priority = self.resolve_priority(id, priority);
        let allocator = self.allocator.as_ref();
        match self.registry.get_mut(id) {
            Some(window) => window.request_capture(priority, allocator),
            None => {
                trace!("Capture requested for unregistered window {}", id);
                false
            }
        }
    }

    pub fn request_capture_icon(&mut self, id: WindowId) -> bool {
        let allocator = self.allocator.as_ref();
        match self.registry.get_mut(id) {
            Some(window) => {
                window.provision_icon(allocator);
                window.request_capture_icon()
            }
            None => false,
        }
    }

    pub fn request_capture_cursor(&mut self) {
        self.cursor.request_capture(self.allocator.as_ref());
    }

    /// Capture `id` periodically. The first capture is requested right away.
    pub fn schedule(&mut self, id: WindowId, schedule: CaptureSchedule) -> bool {
        if !self.registry.contains(id) {
            return false;
        }
        self.scheduler.schedule(id, schedule);
        self.issue(DueCapture {
            id,
            priority: schedule.priority,
            mode: schedule.mode,
            draw_cursor: schedule.draw_cursor,
        });
        true
    }

    pub fn schedule_default(&mut self, id: WindowId) -> bool {
        let schedule = self.config.default_schedule();
        self.schedule(id, schedule)
    }

    pub fn unschedule(&mut self, id: WindowId) -> bool {
        self.scheduler.unschedule(id)
    }

    /// Presentation-layer signal that `id` is about to be sampled. Issues
    /// the capture an `OnlyWhenVisible` schedule was holding back.
    pub fn mark_visible(&mut self, id: WindowId) -> bool {
        match self.scheduler.mark_visible(id) {
            Some(due) => self.issue(due),
            None => false,
        }
    }

    pub fn update_all_window_titles(&self) {
        for window in self.registry.iter() {
            window.request_update_title();
        }
    }

    pub fn update_alt_tab_window_titles(&self) {
        for window in self.registry.iter().filter(|w| w.is_alt_tab_window()) {
            window.request_update_title();
        }
    }

    /// Ask the engine to start tracking `handle`; the entity appears with
    /// the engine's `WindowAdded` message on a later tick.
    pub fn add_native_window(&self, handle: NativeHandle) -> Option<WindowId> {
        if !self.engine_available {
            return None;
        }
        self.engine.add_window(handle)
    }

    pub fn remove_native_window(&self, id: WindowId) {
        if self.engine_available {
            self.engine.remove_window(id);
        }
    }

    // Queries

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_engine_available(&self) -> bool {
        self.engine_available
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn window(&self, id: WindowId) -> Option<&WindowEntity> {
        self.registry.get(id)
    }

    /// Mutable access for subscribing to per-window events.
    pub fn window_mut(&mut self, id: WindowId) -> Option<&mut WindowEntity> {
        self.registry.get_mut(id)
    }

    pub fn windows(&self) -> impl Iterator<Item = &WindowEntity> {
        self.registry.iter()
    }

    pub fn find_by_title(&self, partial: &str, alt_tab_only: bool) -> Option<&WindowEntity> {
        self.registry.find_by_title(partial, alt_tab_only)
    }

    pub fn find_all_by_title(&self, partial: &str) -> Vec<&WindowEntity> {
        self.registry.find_all_by_title(partial)
    }

    pub fn find_by_handle(&self, handle: NativeHandle) -> Option<&WindowEntity> {
        self.registry.find_by_handle(handle)
    }

    pub fn find_desktop(&self, index: usize) -> Option<&WindowEntity> {
        self.registry.find_desktop(index)
    }

    pub fn desktop_count(&self) -> usize {
        self.registry.desktop_count()
    }

    pub fn cursor_window(&self) -> Option<&WindowEntity> {
        self.registry.cursor_window()
    }

    pub fn window_from_point(&self, point: Point) -> Option<&WindowEntity> {
        if !self.engine_available {
            return None;
        }
        self.registry.get(self.engine.window_id_from_point(point)?)
    }

    pub fn cursor(&self) -> &CursorState {
        &self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut CursorState {
        &mut self.cursor
    }

    pub fn cursor_position(&self) -> Point {
        if !self.engine_available {
            return Point::default();
        }
        self.cursor.position()
    }

    pub fn screen_rect(&self) -> Rectangle {
        if !self.engine_available {
            return Rectangle::default();
        }
        self.engine.screen_rect()
    }

    pub fn is_windows_graphics_capture_supported(&self) -> bool {
        self.engine_available && self.engine.is_windows_graphics_capture_supported()
    }

    pub fn scheduler(&self) -> &CaptureScheduler {
        &self.scheduler
    }

    // Notifications

    /// Queue handle for listeners that need to act on what they observe.
    pub fn commands(&self) -> CommandQueue {
        self.commands.clone()
    }

    pub fn events_mut(&mut self) -> &mut SessionEvents {
        &mut self.events
    }

    pub fn on_window_added(&mut self, f: impl FnMut(&WindowEntity) + 'static) -> SubscriptionId {
        self.events.window_added.subscribe(f)
    }

    pub fn on_window_removed(
        &mut self,
        f: impl FnMut(&WindowEntity) + 'static,
    ) -> SubscriptionId {
        self.events.window_removed.subscribe(f)
    }

    pub fn on_desktop_added(&mut self, f: impl FnMut(&WindowEntity) + 'static) -> SubscriptionId {
        self.events.desktop_added.subscribe(f)
    }

    pub fn on_desktop_removed(
        &mut self,
        f: impl FnMut(&WindowEntity) + 'static,
    ) -> SubscriptionId {
        self.events.desktop_removed.subscribe(f)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let allocator = self.allocator.as_ref();
        for mut window in self.registry.drain() {
            window.mark_dead();
            window.release_textures(allocator);
        }
        self.cursor.release(allocator);
        debug!("Session released all textures");
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("engine_available", &self.engine_available)
            .field("windows", &self.registry.len())
            .field("scheduled", &self.scheduler.len())
            .field("pending_commands", &self.commands.len())
            .finish()
    }
}
