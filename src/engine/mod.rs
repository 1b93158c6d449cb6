//! Capture Engine Facade
//!
//! This module defines the contract between the managed session and the
//! native capture engine. The engine owns OS window handles, enumerates
//! windows, performs the actual pixel copies on its own worker threads and
//! reports everything that happened through a pull-based message queue.
//!
//! The session treats the engine as an opaque service:
//! - per-window properties are read on demand and never cached
//! - capture requests are fire-and-forget; completion arrives as a message
//! - texture pointers are bound before the matching capture request
//!
//! [`headless::HeadlessEngine`] is an in-process implementation used by the
//! `winmirror` binary, the integration tests and the benchmarks.

pub mod headless;

use crate::error::SessionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Small integer id assigned by the engine, stable for the lifetime of one
/// OS window's registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowId(pub i32);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque OS window handle. Only ever used as a join key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NativeHandle(pub u64);

impl NativeHandle {
    pub const NULL: NativeHandle = NativeHandle(0);

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// Native pointer of a GPU texture the engine may write into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TexturePtr(pub u64);

/// Message kinds emitted by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    WindowAdded,
    WindowRemoved,
    WindowCaptured,
    WindowSizeChanged,
    IconCaptured,
    CursorCaptured,
    TextureNullError,
    TextureSizeError,
}

/// One entry of the engine's message queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    /// `None` for messages that are not about a window (cursor capture).
    pub window_id: Option<WindowId>,
}

impl Message {
    pub fn window(kind: MessageKind, id: WindowId) -> Self {
        Self {
            kind,
            window_id: Some(id),
        }
    }

    pub fn cursor_captured() -> Self {
        Self {
            kind: MessageKind::CursorCaptured,
            window_id: None,
        }
    }
}

/// Scheduling hint for a capture request.
///
/// `Auto` is resolved by the session's scheduler policy; the engine only
/// ever receives `High`, `Middle` or `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CapturePriority {
    #[default]
    Auto,
    High,
    Middle,
    Low,
}

/// Engine-selectable capture strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    None,
    PrintWindow,
    BitBlt,
    WindowsGraphicsCapture,
    #[default]
    Auto,
}

/// Rectangle for window and screen geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rectangle {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rectangle {
    pub fn from_loc_and_size((x, y): (i32, i32), (width, height): (u32, u32)) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.y >= self.y
            && (point.x as i64) < self.x as i64 + self.width as i64
            && (point.y as i64) < self.y as i64 + self.height as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// Boolean window state reported by the engine in a single read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowFlags {
    pub visible: bool,
    pub enabled: bool,
    pub minimized: bool,
    pub maximized: bool,
    pub alt_tab: bool,
    pub desktop: bool,
    pub child: bool,
    pub touchable: bool,
    pub hung: bool,
    pub background: bool,
    pub uwp: bool,
    pub application_frame: bool,
    pub unicode: bool,
}

/// Contract the session requires from the native capture engine.
///
/// Every method takes `&self`; the engine synchronizes internally with its
/// own capture threads. Reads against an unknown id return the type's
/// default value rather than failing.
#[cfg_attr(test, mockall::automock)]
pub trait CaptureEngine {
    fn initialize(&self) -> Result<(), SessionError>;
    /// Advance the engine by one session tick (`dt` seconds).
    fn update(&self, dt: f32);

    /// Snapshot of the queued messages, oldest first.
    fn messages(&self) -> Vec<Message>;
    /// Acknowledge the snapshot returned by [`CaptureEngine::messages`].
    fn clear_messages(&self);

    fn add_window(&self, handle: NativeHandle) -> Option<WindowId>;
    fn remove_window(&self, id: WindowId);
    fn window_exists(&self, id: WindowId) -> bool;

    fn window_handle(&self, id: WindowId) -> NativeHandle;
    /// Explicit parent id, when the engine knows it.
    fn window_parent_id(&self, id: WindowId) -> Option<WindowId>;
    fn window_owner_handle(&self, id: WindowId) -> NativeHandle;
    fn window_process_id(&self, id: WindowId) -> u32;
    fn window_thread_id(&self, id: WindowId) -> u32;
    /// Raw OS frame of the window.
    fn window_rect(&self, id: WindowId) -> Rectangle;
    /// Size of the captured area, i.e. the size a texture must have.
    fn window_texture_size(&self, id: WindowId) -> (u32, u32);
    /// Offset of the captured area relative to the raw frame.
    fn window_texture_offset(&self, id: WindowId) -> Point;
    fn window_z_order(&self, id: WindowId) -> i32;
    fn window_title(&self, id: WindowId) -> String;
    fn window_class_name(&self, id: WindowId) -> String;
    fn window_flags(&self, id: WindowId) -> WindowFlags;
    fn window_icon_size(&self, id: WindowId) -> (u32, u32);
    /// BGRA32 pixels of the last capture, `None` if out of range.
    fn window_pixels(&self, id: WindowId, x: i32, y: i32, width: u32, height: u32)
        -> Option<Vec<u8>>;

    fn window_capture_mode(&self, id: WindowId) -> CaptureMode;
    fn set_window_capture_mode(&self, id: WindowId, mode: CaptureMode);
    fn window_cursor_draw(&self, id: WindowId) -> bool;
    fn set_window_cursor_draw(&self, id: WindowId, draw: bool);
    fn request_update_title(&self, id: WindowId);

    fn bind_texture_pointer(&self, id: WindowId, ptr: TexturePtr);
    fn request_capture(&self, id: WindowId, priority: CapturePriority);
    fn bind_icon_texture_pointer(&self, id: WindowId, ptr: TexturePtr);
    fn request_capture_icon(&self, id: WindowId);

    fn cursor_position(&self) -> Point;
    fn cursor_size(&self) -> (u32, u32);
    fn bind_cursor_texture_pointer(&self, ptr: TexturePtr);
    fn request_capture_cursor(&self);

    fn screen_rect(&self) -> Rectangle;
    fn window_id_under_cursor(&self) -> Option<WindowId>;
    fn window_id_from_point(&self, point: Point) -> Option<WindowId>;
    fn is_windows_graphics_capture_supported(&self) -> bool;
}
