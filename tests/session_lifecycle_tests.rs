// Texture and window lifecycle tests for the capture session
//
// Drives a session over the headless engine and checks the double-buffer
// swap protocol, error recovery and that every texture is eventually
// released.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use winmirror::engine::headless::{HeadlessEngine, HeadlessWindow};
use winmirror::engine::{Message, MessageKind, Point, Rectangle};
use winmirror::texture::TexturePhase;
use winmirror::{CapturePriority, Session, SessionConfig, WindowId};

const DT: f32 = 1.0 / 60.0;

fn start(engine: HeadlessEngine) -> (Session, Arc<HeadlessEngine>) {
    let engine = Arc::new(engine);
    let mut session = Session::new(SessionConfig::default(), engine.clone(), engine.clone())
        .expect("default config is valid");
    session.update(DT);
    (session, engine)
}

fn single_window(width: u32, height: u32) -> (Session, Arc<HeadlessEngine>, WindowId) {
    let engine = HeadlessEngine::new();
    let id = engine.spawn_window(
        HeadlessWindow::new("Editor")
            .with_rect(0, 0, width, height)
            .with_icon_size(0, 0),
    );
    let (session, engine) = start(engine);
    (session, engine, id)
}

#[test]
fn test_capture_swaps_pending_into_front() {
    let (mut session, engine, id) = single_window(100, 100);
    assert!(session.window(id).unwrap().texture().is_none());

    assert!(session.request_capture(id, CapturePriority::High));
    let window = session.window(id).unwrap();
    assert_eq!(window.texture_phase(), TexturePhase::Provisioning);
    assert!(window.texture().is_none());

    let report = session.update(DT);
    assert_eq!(report.captures_completed, 1);

    let window = session.window(id).unwrap();
    assert_eq!(window.texture_phase(), TexturePhase::Stable);
    assert_eq!(window.texture_size(), (100, 100));
    assert!(window.pending_texture().is_none());
    assert_eq!(engine.capture_count(id), 1);
}

#[test]
fn test_repeated_captures_keep_front_identity() {
    let (mut session, _engine, id) = single_window(64, 64);
    let captured = Rc::new(Cell::new(0));
    let counter = captured.clone();
    session
        .window_mut(id)
        .unwrap()
        .on_captured(move |_| counter.set(counter.get() + 1));

    session.request_capture(id, CapturePriority::High);
    session.update(DT);
    let front = session.window(id).unwrap().texture().map(|t| t.id());
    assert!(front.is_some());

    for _ in 0..5 {
        session.request_capture(id, CapturePriority::High);
        session.update(DT);
        assert_eq!(session.window(id).unwrap().texture().map(|t| t.id()), front);
    }
    assert_eq!(captured.get(), 6);
}

#[test]
fn test_resize_keeps_old_front_until_next_capture() {
    let (mut session, engine, id) = single_window(100, 100);
    session.request_capture(id, CapturePriority::High);
    session.update(DT);

    let sizes_on_capture = Rc::new(RefCell::new(Vec::new()));
    let sink = sizes_on_capture.clone();
    session
        .window_mut(id)
        .unwrap()
        .on_captured(move |window| sink.borrow_mut().push(window.texture_size()));

    engine.resize_window(id, 200, 150);
    session.update(DT);
    // Resize is only detected by the next request.
    assert_eq!(session.window(id).unwrap().texture_size(), (100, 100));

    session.request_capture(id, CapturePriority::High);
    let window = session.window(id).unwrap();
    assert_eq!(window.texture_size(), (100, 100));
    assert_eq!(window.pending_texture().map(|t| t.size()), Some((200, 150)));

    session.update(DT);
    assert_eq!(session.window(id).unwrap().texture_size(), (200, 150));
    assert_eq!(*sizes_on_capture.borrow(), vec![(200, 150)]);
    assert_eq!(engine.live_textures(), 1);
}

#[test]
fn test_size_changed_notifies_without_touching_textures() {
    let (mut session, engine, id) = single_window(100, 100);
    session.request_capture(id, CapturePriority::High);
    session.update(DT);
    let front = session.window(id).unwrap().texture().map(|t| t.id());

    let notified = Rc::new(RefCell::new(Vec::new()));
    let sink = notified.clone();
    session
        .window_mut(id)
        .unwrap()
        .on_size_changed(move |window| sink.borrow_mut().push(window.width()));

    engine.resize_window(id, 160, 120);
    let report = session.update(DT);
    assert_eq!(report.captures_completed, 0);
    assert_eq!(*notified.borrow(), vec![160]);

    let window = session.window(id).unwrap();
    assert_eq!(window.texture().map(|t| t.id()), front);
    assert_eq!(window.texture_size(), (100, 100));
    assert!(window.pending_texture().is_none());
    assert_eq!(window.texture_phase(), TexturePhase::Stable);
    assert_eq!(engine.live_textures(), 1);

    session.request_capture(id, CapturePriority::High);
    assert_eq!(
        session.window(id).unwrap().pending_texture().map(|t| t.size()),
        Some((160, 120))
    );
}

#[test]
fn test_resize_during_in_flight_capture_recovers() {
    let (mut session, engine, id) = single_window(100, 100);
    session.request_capture(id, CapturePriority::High);
    let bound = engine.bound_pointer(id);

    engine.resize_window(id, 120, 90);
    // The pending texture is still the engine's target: do not rebind.
    session.request_capture(id, CapturePriority::High);
    assert_eq!(engine.bound_pointer(id), bound);

    let report = session.update(DT);
    assert_eq!(report.texture_errors, 1);
    assert_ne!(engine.bound_pointer(id), bound);
    assert!(session.window(id).unwrap().texture().is_none());

    session.request_capture(id, CapturePriority::High);
    session.update(DT);
    assert_eq!(session.window(id).unwrap().texture_size(), (120, 90));
    assert_eq!(engine.live_textures(), 1);
}

#[test]
fn test_texture_null_error_reprovisions_without_losing_front() {
    let (mut session, engine, id) = single_window(50, 50);
    session.request_capture(id, CapturePriority::High);
    session.update(DT);
    let front = session.window(id).unwrap().texture().map(|t| t.id());

    engine.push_message(Message::window(MessageKind::TextureNullError, id));
    let report = session.update(DT);
    assert_eq!(report.texture_errors, 1);

    let window = session.window(id).unwrap();
    assert_eq!(window.texture().map(|t| t.id()), front);
    assert_eq!(window.texture_phase(), TexturePhase::Provisioning);

    session.request_capture(id, CapturePriority::High);
    session.update(DT);
    let window = session.window(id).unwrap();
    assert_ne!(window.texture().map(|t| t.id()), front);
    assert_eq!(window.texture_size(), (50, 50));
    assert_eq!(engine.live_textures(), 1);
}

#[test]
fn test_allocation_failure_is_retried_on_next_request() {
    let (mut session, engine, id) = single_window(40, 30);
    engine.fail_allocations(true);

    // Nothing is bound, so the engine is never asked.
    assert!(!session.request_capture(id, CapturePriority::High));
    assert_eq!(engine.bound_pointer(id), None);
    assert_eq!(engine.queued_requests(), (0, 0, 0));
    let report = session.update(DT);
    assert_eq!(report.texture_errors, 0);
    assert!(session.window(id).unwrap().texture().is_none());

    engine.fail_allocations(false);
    assert!(session.request_capture(id, CapturePriority::High));
    session.update(DT);
    assert_eq!(session.window(id).unwrap().texture_size(), (40, 30));
}

#[test]
fn test_allocation_failure_on_resize_skips_request() {
    let (mut session, engine, id) = single_window(40, 30);
    session.request_capture(id, CapturePriority::High);
    session.update(DT);

    engine.resize_window(id, 80, 60);
    engine.fail_allocations(true);
    assert!(!session.request_capture(id, CapturePriority::High));
    let report = session.update(DT);
    assert_eq!(report.texture_errors, 0);
    assert_eq!(engine.capture_count(id), 1);
    assert_eq!(session.window(id).unwrap().texture_size(), (40, 30));
}

#[test]
fn test_closing_window_releases_its_textures() {
    let engine = HeadlessEngine::new();
    let keep = engine.spawn_window(HeadlessWindow::new("keep").with_rect(0, 0, 30, 30));
    let close = engine.spawn_window(HeadlessWindow::new("close").with_rect(0, 0, 60, 60));
    let (mut session, engine) = start(engine);

    for id in [keep, close] {
        session.request_capture(id, CapturePriority::High);
    }
    session.update(DT);
    // Window texture plus icon texture for each.
    assert_eq!(engine.live_textures(), 4);

    engine.close_window(close);
    let report = session.update(DT);
    assert_eq!(report.windows_removed, 1);
    assert_eq!(engine.live_textures(), 2);

    drop(session);
    assert_eq!(engine.live_textures(), 0);
}

#[test]
fn test_window_closed_with_capture_in_flight() {
    let (mut session, engine, id) = single_window(80, 80);
    session.request_capture(id, CapturePriority::High);
    engine.close_window(id);

    let report = session.update(DT);
    assert_eq!(report.windows_removed, 1);
    assert_eq!(report.captures_completed, 0);
    assert!(session.window(id).is_none());
    assert_eq!(engine.live_textures(), 0);

    // A completion that raced the close is dropped.
    engine.push_message(Message::window(MessageKind::WindowCaptured, id));
    let report = session.update(DT);
    assert_eq!(report.ignored, 1);
    assert!(!session.request_capture(id, CapturePriority::High));
}

#[test]
fn test_removed_entity_reads_return_defaults() {
    let engine = HeadlessEngine::new();
    let id = engine.spawn_window(
        HeadlessWindow::new("Going away")
            .with_rect(10, 20, 64, 48)
            .with_z_order(3),
    );
    let (mut session, engine) = start(engine);
    session.request_capture(id, CapturePriority::High);
    session.update(DT);

    let observed = Rc::new(RefCell::new(None));
    let sink = observed.clone();
    session.on_window_removed(move |window| {
        *sink.borrow_mut() = Some((
            window.is_alive(),
            window.title(),
            window.rect(),
            window.z_order(),
            window.texture().is_none(),
            window.pixel(0, 0),
            window.has_icon(),
        ));
    });

    engine.close_window(id);
    session.update(DT);

    assert_eq!(
        observed.borrow().clone(),
        Some((false, String::new(), Rectangle::default(), 0, true, None, false))
    );
}

#[test]
fn test_icon_capture_replaces_placeholder() {
    let engine = HeadlessEngine::new();
    let id = engine.spawn_window(HeadlessWindow::new("Iconic").with_icon_size(16, 16));
    let (mut session, _engine) = start(engine);

    let icon_events = Rc::new(Cell::new(0));
    let counter = icon_events.clone();
    session
        .window_mut(id)
        .unwrap()
        .on_icon_captured(move |_| counter.set(counter.get() + 1));
    assert!(!session.window(id).unwrap().has_icon());

    assert!(session.request_capture_icon(id));
    session.update(DT);

    let window = session.window(id).unwrap();
    assert!(window.has_icon());
    assert_eq!(window.icon_size(), (16, 16));
    assert_eq!(icon_events.get(), 1);
}

#[test]
fn test_pixels_read_back_after_capture() {
    let (mut session, _engine, id) = single_window(8, 8);
    assert!(session.window(id).unwrap().pixel(1, 2).is_none());

    session.request_capture(id, CapturePriority::High);
    session.update(DT);

    let window = session.window(id).unwrap();
    assert_eq!(window.pixel(1, 2), Some([1, 2, id.0 as u8, 0xff]));
    assert_eq!(window.pixels(0, 0, 8, 8).map(|p| p.len()), Some(8 * 8 * 4));
    assert!(window.pixels(4, 4, 8, 8).is_none());
}

#[test]
fn test_cursor_texture_follows_cursor_size() {
    let engine = HeadlessEngine::new();
    engine.set_cursor(Point { x: 5, y: 5 }, (32, 32));
    let engine = Arc::new(engine);

    let mut config = SessionConfig::default();
    config.cursor.capture = true;
    config.cursor.frame_rate = -1.0;
    let mut session = Session::new(config, engine.clone(), engine.clone()).unwrap();

    let changed = Rc::new(Cell::new(0));
    let captured = Rc::new(Cell::new(0));
    let c = changed.clone();
    session.cursor_mut().on_texture_changed(move |_| c.set(c.get() + 1));
    let c = captured.clone();
    session.cursor_mut().on_captured(move |_| c.set(c.get() + 1));

    session.update(DT);
    assert_eq!(changed.get(), 1);
    assert_eq!(session.cursor().texture().map(|t| t.size()), Some((32, 32)));

    session.update(DT);
    assert_eq!(captured.get(), 1);
    assert_eq!(changed.get(), 1);

    engine.set_cursor(Point { x: 5, y: 5 }, (48, 48));
    session.update(DT);
    assert_eq!(changed.get(), 2);
    assert_eq!(session.cursor().texture().map(|t| t.size()), Some((48, 48)));
    assert_eq!(engine.live_textures(), 1);
}

#[test]
fn test_engine_failure_degrades_to_empty_registry() {
    let engine = HeadlessEngine::failing("no capture device");
    engine.spawn_window(HeadlessWindow::new("invisible"));
    let engine = Arc::new(engine);

    let mut session = Session::new(SessionConfig::default(), engine.clone(), engine).unwrap();
    assert!(!session.is_engine_available());

    for _ in 0..3 {
        assert_eq!(session.update(DT).messages, 0);
    }
    assert!(session.registry().is_empty());
    assert!(session.find_by_title("invisible", false).is_none());
}
