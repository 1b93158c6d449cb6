//! Headless capture engine
//!
//! A deterministic in-process [`CaptureEngine`] that simulates the native
//! engine's behaviour without touching the OS: windows are described with
//! [`HeadlessWindow`], captures are serviced from three priority queues on
//! every [`CaptureEngine::update`], and completion is reported through the
//! same message queue protocol a native engine uses.
//!
//! It is also a [`TextureAllocator`], so a capture can check that the
//! pointer it was given still names a live texture of the right size.

use super::{
    CaptureEngine, CaptureMode, CapturePriority, Message, MessageKind, NativeHandle, Point,
    Rectangle, TexturePtr, WindowFlags, WindowId,
};
use crate::error::SessionError;
use crate::texture::{Texture, TextureAllocator, TextureId, TextureUsage};
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Captures serviced per update unless configured otherwise
pub const DEFAULT_CAPTURE_BUDGET: usize = 8;

const TEXTURE_PTR_BASE: u64 = 0x7f00_0000;

/// Description of a simulated OS window
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessWindow {
    pub handle: NativeHandle,
    pub title: String,
    pub class_name: String,
    pub rect: Rectangle,
    pub texture_offset: Point,
    pub z_order: i32,
    pub process_id: u32,
    pub thread_id: u32,
    pub parent: Option<WindowId>,
    pub owner: NativeHandle,
    pub flags: WindowFlags,
    pub icon_size: (u32, u32),
}

impl HeadlessWindow {
    /// A visible, alt-tab eligible top-level window.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            handle: NativeHandle::NULL,
            title: title.into(),
            class_name: "HeadlessWindow".to_string(),
            rect: Rectangle::from_loc_and_size((0, 0), (640, 480)),
            texture_offset: Point::default(),
            z_order: 0,
            process_id: 1,
            thread_id: 1,
            parent: None,
            owner: NativeHandle::NULL,
            flags: WindowFlags {
                visible: true,
                enabled: true,
                alt_tab: true,
                unicode: true,
                ..Default::default()
            },
            icon_size: (32, 32),
        }
    }

    /// A desktop surface covering `rect`.
    pub fn desktop(rect: Rectangle) -> Self {
        let mut window = Self::new("");
        window.class_name = "HeadlessDesktop".to_string();
        window.rect = rect;
        window.z_order = i32::MAX;
        window.flags.alt_tab = false;
        window.flags.desktop = true;
        window.icon_size = (0, 0);
        window
    }

    pub fn with_rect(mut self, x: i32, y: i32, width: u32, height: u32) -> Self {
        self.rect = Rectangle::from_loc_and_size((x, y), (width, height));
        self
    }

    pub fn with_z_order(mut self, z_order: i32) -> Self {
        self.z_order = z_order;
        self
    }

    pub fn with_parent(mut self, parent: WindowId) -> Self {
        self.parent = Some(parent);
        self.flags.child = true;
        self.flags.alt_tab = false;
        self
    }

    pub fn with_owner(mut self, owner: NativeHandle) -> Self {
        self.owner = owner;
        self
    }

    pub fn with_process(mut self, process_id: u32, thread_id: u32) -> Self {
        self.process_id = process_id;
        self.thread_id = thread_id;
        self
    }

    /// Flag as a child window without reporting who the parent is.
    pub fn child(mut self) -> Self {
        self.flags.child = true;
        self.flags.alt_tab = false;
        self
    }

    pub fn with_alt_tab(mut self, alt_tab: bool) -> Self {
        self.flags.alt_tab = alt_tab;
        self
    }

    pub fn with_icon_size(mut self, width: u32, height: u32) -> Self {
        self.icon_size = (width, height);
        self
    }

    pub fn with_texture_offset(mut self, x: i32, y: i32) -> Self {
        self.texture_offset = Point { x, y };
        self
    }
}

#[derive(Debug)]
struct WindowState {
    window: HeadlessWindow,
    capture_mode: CaptureMode,
    cursor_draw: bool,
    bound: Option<TexturePtr>,
    icon_bound: Option<TexturePtr>,
    captured_size: Option<(u32, u32)>,
    capture_count: usize,
    title_requests: usize,
}

impl WindowState {
    fn texture_size(&self) -> (u32, u32) {
        self.window.rect.size()
    }
}

#[derive(Debug)]
struct HeadlessState {
    initialized: bool,
    init_failure: Option<String>,
    next_id: i32,
    next_handle: u64,
    windows: BTreeMap<WindowId, WindowState>,
    messages: Vec<Message>,
    /// Length of the snapshot handed out by the last `messages()` call.
    snapshot: usize,
    high: VecDeque<WindowId>,
    middle: VecDeque<WindowId>,
    low: VecDeque<WindowId>,
    icon_requests: VecDeque<WindowId>,
    cursor_requested: bool,
    cursor_bound: Option<TexturePtr>,
    cursor_position: Point,
    cursor_size: (u32, u32),
    screen: Rectangle,
    capture_budget: usize,
    textures: HashMap<TexturePtr, (u32, u32)>,
    next_texture: u64,
    fail_allocations: bool,
}

impl HeadlessState {
    fn push(&mut self, kind: MessageKind, id: WindowId) {
        self.messages.push(Message::window(kind, id));
    }

    fn insert(&mut self, mut window: HeadlessWindow) -> WindowId {
        self.next_id += 1;
        let id = WindowId(self.next_id);
        if window.handle.is_null() {
            self.next_handle += 1;
            window.handle = NativeHandle(self.next_handle);
        }
        self.windows.insert(
            id,
            WindowState {
                window,
                capture_mode: CaptureMode::Auto,
                cursor_draw: true,
                bound: None,
                icon_bound: None,
                captured_size: None,
                capture_count: 0,
                title_requests: 0,
            },
        );
        if self.initialized {
            self.push(MessageKind::WindowAdded, id);
        }
        id
    }

    fn remove(&mut self, id: WindowId) -> bool {
        if self.windows.remove(&id).is_none() {
            return false;
        }
        self.high.retain(|queued| *queued != id);
        self.middle.retain(|queued| *queued != id);
        self.low.retain(|queued| *queued != id);
        self.icon_requests.retain(|queued| *queued != id);
        if self.initialized {
            self.push(MessageKind::WindowRemoved, id);
        }
        true
    }

    fn is_queued(&self, id: WindowId) -> bool {
        self.high.contains(&id) || self.middle.contains(&id) || self.low.contains(&id)
    }

    /// High first; each High dequeue promotes one Middle item into High.
    fn next_capture(&mut self) -> Option<WindowId> {
        if let Some(id) = self.high.pop_front() {
            if let Some(promoted) = self.middle.pop_front() {
                self.high.push_back(promoted);
            }
            return Some(id);
        }
        self.middle.pop_front().or_else(|| self.low.pop_front())
    }

    fn capture(&mut self, id: WindowId) {
        let Some(state) = self.windows.get(&id) else {
            return;
        };
        let expected = state.texture_size();
        let outcome = match state.bound.map(|ptr| self.textures.get(&ptr).copied()) {
            None | Some(None) => MessageKind::TextureNullError,
            Some(Some(size)) if size != expected => MessageKind::TextureSizeError,
            Some(Some(_)) => MessageKind::WindowCaptured,
        };
        if outcome == MessageKind::WindowCaptured {
            if let Some(state) = self.windows.get_mut(&id) {
                state.captured_size = Some(expected);
                state.capture_count += 1;
            }
        }
        self.push(outcome, id);
    }

    fn capture_icon(&mut self, id: WindowId) {
        let bound = self
            .windows
            .get(&id)
            .and_then(|state| state.icon_bound)
            .is_some_and(|ptr| self.textures.contains_key(&ptr));
        if bound {
            self.push(MessageKind::IconCaptured, id);
        }
    }

    fn window_at(&self, point: Point) -> Option<WindowId> {
        self.windows
            .iter()
            .filter(|(_, state)| {
                let flags = state.window.flags;
                flags.visible && !flags.minimized && state.window.rect.contains(point)
            })
            .min_by_key(|(id, state)| (state.window.z_order, **id))
            .map(|(id, _)| *id)
    }
}

/// In-process capture engine; see the module docs.
#[derive(Debug)]
pub struct HeadlessEngine {
    state: Mutex<HeadlessState>,
}

impl Default for HeadlessEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HeadlessState {
                initialized: false,
                init_failure: None,
                next_id: 0,
                next_handle: 0x1_0000,
                windows: BTreeMap::new(),
                messages: Vec::new(),
                snapshot: 0,
                high: VecDeque::new(),
                middle: VecDeque::new(),
                low: VecDeque::new(),
                icon_requests: VecDeque::new(),
                cursor_requested: false,
                cursor_bound: None,
                cursor_position: Point::default(),
                cursor_size: (32, 32),
                screen: Rectangle::from_loc_and_size((0, 0), (1920, 1080)),
                capture_budget: DEFAULT_CAPTURE_BUDGET,
                textures: HashMap::new(),
                next_texture: 0,
                fail_allocations: false,
            }),
        }
    }

    /// An engine whose `initialize` always fails with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        let engine = Self::new();
        engine.state.lock().init_failure = Some(reason.into());
        engine
    }

    /// A desktop covering the screen plus `count` cascaded top-level
    /// windows, front-most last.
    pub fn with_demo_windows(count: usize) -> Self {
        let engine = Self::new();
        let screen = engine.screen_rect();
        engine.spawn_window(HeadlessWindow::desktop(screen));
        for i in 0..count {
            let offset = 40 * i as i32;
            engine.spawn_window(
                HeadlessWindow::new(format!("Window {}", i + 1))
                    .with_rect(offset, offset, 640 + 16 * i as u32, 480)
                    .with_z_order((count - i) as i32)
                    .with_process(100 + i as u32, 1),
            );
        }
        engine
    }

    /// Add a window. `WindowAdded` is queued once the engine is initialized;
    /// windows spawned earlier are reported by `initialize`.
    pub fn spawn_window(&self, window: HeadlessWindow) -> WindowId {
        let mut state = self.state.lock();
        let id = state.insert(window);
        debug!("Headless window {} spawned", id);
        id
    }

    /// Close a window as the OS would. Returns `false` for unknown ids.
    pub fn close_window(&self, id: WindowId) -> bool {
        self.state.lock().remove(id)
    }

    pub fn resize_window(&self, id: WindowId, width: u32, height: u32) {
        let mut state = self.state.lock();
        if let Some(window) = state.windows.get_mut(&id) {
            window.window.rect.width = width;
            window.window.rect.height = height;
            state.push(MessageKind::WindowSizeChanged, id);
        }
    }

    pub fn move_window(&self, id: WindowId, x: i32, y: i32) {
        if let Some(window) = self.state.lock().windows.get_mut(&id) {
            window.window.rect.x = x;
            window.window.rect.y = y;
        }
    }

    pub fn set_title(&self, id: WindowId, title: impl Into<String>) {
        if let Some(window) = self.state.lock().windows.get_mut(&id) {
            window.window.title = title.into();
        }
    }

    pub fn set_z_order(&self, id: WindowId, z_order: i32) {
        if let Some(window) = self.state.lock().windows.get_mut(&id) {
            window.window.z_order = z_order;
        }
    }

    pub fn set_flags(&self, id: WindowId, flags: WindowFlags) {
        if let Some(window) = self.state.lock().windows.get_mut(&id) {
            window.window.flags = flags;
        }
    }

    pub fn set_cursor(&self, position: Point, size: (u32, u32)) {
        let mut state = self.state.lock();
        state.cursor_position = position;
        state.cursor_size = size;
    }

    /// Queue an arbitrary message, e.g. a late completion for a closed window.
    pub fn push_message(&self, message: Message) {
        self.state.lock().messages.push(message);
    }

    pub fn set_capture_budget(&self, budget: usize) {
        self.state.lock().capture_budget = budget;
    }

    pub fn fail_allocations(&self, fail: bool) {
        self.state.lock().fail_allocations = fail;
    }

    /// Textures allocated and not yet released.
    pub fn live_textures(&self) -> usize {
        self.state.lock().textures.len()
    }

    /// Completed captures for `id`.
    pub fn capture_count(&self, id: WindowId) -> usize {
        self.state
            .lock()
            .windows
            .get(&id)
            .map(|window| window.capture_count)
            .unwrap_or(0)
    }

    pub fn title_requests(&self, id: WindowId) -> usize {
        self.state
            .lock()
            .windows
            .get(&id)
            .map(|window| window.title_requests)
            .unwrap_or(0)
    }

    /// Pending requests as (high, middle, low) queue lengths.
    pub fn queued_requests(&self) -> (usize, usize, usize) {
        let state = self.state.lock();
        (state.high.len(), state.middle.len(), state.low.len())
    }

    pub fn bound_pointer(&self, id: WindowId) -> Option<TexturePtr> {
        self.state.lock().windows.get(&id).and_then(|window| window.bound)
    }
}

impl CaptureEngine for HeadlessEngine {
    fn initialize(&self) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        if let Some(reason) = &state.init_failure {
            return Err(SessionError::EngineUnavailable(reason.clone()));
        }
        if state.initialized {
            return Ok(());
        }
        state.initialized = true;

        let existing: Vec<WindowId> = state.windows.keys().copied().collect();
        for id in &existing {
            state.push(MessageKind::WindowAdded, *id);
        }
        info!("🧪 Headless engine started with {} windows", existing.len());
        Ok(())
    }

    fn update(&self, _dt: f32) {
        let mut state = self.state.lock();
        if !state.initialized {
            return;
        }

        for _ in 0..state.capture_budget {
            match state.next_capture() {
                Some(id) => state.capture(id),
                None => break,
            }
        }

        while let Some(id) = state.icon_requests.pop_front() {
            state.capture_icon(id);
        }

        if std::mem::take(&mut state.cursor_requested) {
            let bound = state
                .cursor_bound
                .is_some_and(|ptr| state.textures.contains_key(&ptr));
            if bound {
                state.messages.push(Message::cursor_captured());
            }
        }
    }

    fn messages(&self) -> Vec<Message> {
        let mut state = self.state.lock();
        state.snapshot = state.messages.len();
        state.messages.clone()
    }

    fn clear_messages(&self) {
        let mut state = self.state.lock();
        let delivered = state.snapshot.min(state.messages.len());
        state.messages.drain(..delivered);
        state.snapshot = 0;
    }

    fn add_window(&self, handle: NativeHandle) -> Option<WindowId> {
        if handle.is_null() {
            return None;
        }
        let mut state = self.state.lock();
        let known = state
            .windows
            .iter()
            .find(|(_, window)| window.window.handle == handle)
            .map(|(id, _)| *id);
        if known.is_some() {
            return known;
        }
        let mut window = HeadlessWindow::new("");
        window.handle = handle;
        Some(state.insert(window))
    }

    fn remove_window(&self, id: WindowId) {
        self.state.lock().remove(id);
    }

    fn window_exists(&self, id: WindowId) -> bool {
        self.state.lock().windows.contains_key(&id)
    }

    fn window_handle(&self, id: WindowId) -> NativeHandle {
        self.read(id, |w| w.window.handle)
    }

    fn window_parent_id(&self, id: WindowId) -> Option<WindowId> {
        self.read(id, |w| w.window.parent)
    }

    fn window_owner_handle(&self, id: WindowId) -> NativeHandle {
        self.read(id, |w| w.window.owner)
    }

    fn window_process_id(&self, id: WindowId) -> u32 {
        self.read(id, |w| w.window.process_id)
    }

    fn window_thread_id(&self, id: WindowId) -> u32 {
        self.read(id, |w| w.window.thread_id)
    }

    fn window_rect(&self, id: WindowId) -> Rectangle {
        self.read(id, |w| w.window.rect)
    }

    fn window_texture_size(&self, id: WindowId) -> (u32, u32) {
        self.read(id, WindowState::texture_size)
    }

    fn window_texture_offset(&self, id: WindowId) -> Point {
        self.read(id, |w| w.window.texture_offset)
    }

    fn window_z_order(&self, id: WindowId) -> i32 {
        self.read(id, |w| w.window.z_order)
    }

    fn window_title(&self, id: WindowId) -> String {
        self.read(id, |w| w.window.title.clone())
    }

    fn window_class_name(&self, id: WindowId) -> String {
        self.read(id, |w| w.window.class_name.clone())
    }

    fn window_flags(&self, id: WindowId) -> WindowFlags {
        self.read(id, |w| w.window.flags)
    }

    fn window_icon_size(&self, id: WindowId) -> (u32, u32) {
        self.read(id, |w| w.window.icon_size)
    }

    /// Synthetic BGRA32 pattern: blue = x, green = y, red = window id.
    fn window_pixels(
        &self,
        id: WindowId,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    ) -> Option<Vec<u8>> {
        let state = self.state.lock();
        let (captured_width, captured_height) = state.windows.get(&id)?.captured_size?;
        if x < 0 || y < 0 || width == 0 || height == 0 {
            return None;
        }
        let (x, y) = (x as u32, y as u32);
        if x.checked_add(width)? > captured_width || y.checked_add(height)? > captured_height {
            return None;
        }

        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for row in y..y + height {
            for column in x..x + width {
                pixels.extend_from_slice(&[column as u8, row as u8, id.0 as u8, 0xff]);
            }
        }
        Some(pixels)
    }

    fn window_capture_mode(&self, id: WindowId) -> CaptureMode {
        self.state
            .lock()
            .windows
            .get(&id)
            .map(|w| w.capture_mode)
            .unwrap_or(CaptureMode::None)
    }

    fn set_window_capture_mode(&self, id: WindowId, mode: CaptureMode) {
        if let Some(window) = self.state.lock().windows.get_mut(&id) {
            window.capture_mode = mode;
        }
    }

    fn window_cursor_draw(&self, id: WindowId) -> bool {
        self.read(id, |w| w.cursor_draw)
    }

    fn set_window_cursor_draw(&self, id: WindowId, draw: bool) {
        if let Some(window) = self.state.lock().windows.get_mut(&id) {
            window.cursor_draw = draw;
        }
    }

    fn request_update_title(&self, id: WindowId) {
        if let Some(window) = self.state.lock().windows.get_mut(&id) {
            window.title_requests += 1;
        }
    }

    fn bind_texture_pointer(&self, id: WindowId, ptr: TexturePtr) {
        if let Some(window) = self.state.lock().windows.get_mut(&id) {
            window.bound = Some(ptr);
        }
    }

    fn request_capture(&self, id: WindowId, priority: CapturePriority) {
        let mut state = self.state.lock();
        if !state.windows.contains_key(&id) || state.is_queued(id) {
            return;
        }
        match priority {
            CapturePriority::High | CapturePriority::Auto => state.high.push_back(id),
            CapturePriority::Middle => state.middle.push_back(id),
            CapturePriority::Low => state.low.push_back(id),
        }
    }

    fn bind_icon_texture_pointer(&self, id: WindowId, ptr: TexturePtr) {
        if let Some(window) = self.state.lock().windows.get_mut(&id) {
            window.icon_bound = Some(ptr);
        }
    }

    fn request_capture_icon(&self, id: WindowId) {
        let mut state = self.state.lock();
        if state.windows.contains_key(&id) && !state.icon_requests.contains(&id) {
            state.icon_requests.push_back(id);
        }
    }

    fn cursor_position(&self) -> Point {
        self.state.lock().cursor_position
    }

    fn cursor_size(&self) -> (u32, u32) {
        self.state.lock().cursor_size
    }

    fn bind_cursor_texture_pointer(&self, ptr: TexturePtr) {
        self.state.lock().cursor_bound = Some(ptr);
    }

    fn request_capture_cursor(&self) {
        self.state.lock().cursor_requested = true;
    }

    fn screen_rect(&self) -> Rectangle {
        self.state.lock().screen
    }

    fn window_id_under_cursor(&self) -> Option<WindowId> {
        let state = self.state.lock();
        state.window_at(state.cursor_position)
    }

    fn window_id_from_point(&self, point: Point) -> Option<WindowId> {
        self.state.lock().window_at(point)
    }

    fn is_windows_graphics_capture_supported(&self) -> bool {
        true
    }
}

impl HeadlessEngine {
    fn read<T: Default>(&self, id: WindowId, f: impl FnOnce(&WindowState) -> T) -> T {
        self.state.lock().windows.get(&id).map(f).unwrap_or_default()
    }
}

impl TextureAllocator for HeadlessEngine {
    fn allocate(
        &self,
        width: u32,
        height: u32,
        usage: TextureUsage,
    ) -> Result<Texture, SessionError> {
        let mut state = self.state.lock();
        if state.fail_allocations {
            return Err(SessionError::TextureAllocation {
                width,
                height,
                reason: format!("{:?} allocations disabled", usage),
            });
        }
        state.next_texture += 1;
        let serial = state.next_texture;
        let ptr = TexturePtr(TEXTURE_PTR_BASE + serial);
        state.textures.insert(ptr, (width, height));
        Ok(Texture::new(TextureId(serial), width, height, ptr))
    }

    fn release(&self, texture: Texture) {
        self.state.lock().textures.remove(&texture.native_ptr());
    }
}
