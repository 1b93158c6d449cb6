use super::*;
use crate::engine::headless::HeadlessEngine;
use crate::engine::MockCaptureEngine;
use mockall::predicate::eq;
use std::cell::Cell;
use std::rc::Rc;

fn entity(mock: MockCaptureEngine) -> WindowEntity {
    WindowEntity::new(
        WindowId(7),
        NativeHandle(0x70),
        None,
        WindowKind::Window,
        Arc::new(mock),
    )
}

#[test]
fn test_live_reads_delegate_to_engine() {
    let mut mock = MockCaptureEngine::new();
    mock.expect_window_title()
        .with(eq(WindowId(7)))
        .returning(|_| "Terminal".to_string());
    mock.expect_window_rect()
        .returning(|_| Rectangle::from_loc_and_size((10, 20), (300, 200)));
    mock.expect_window_texture_offset()
        .returning(|_| Point { x: 2, y: 3 });
    mock.expect_window_texture_size().returning(|_| (296, 190));
    mock.expect_window_flags().returning(|_| WindowFlags {
        visible: true,
        alt_tab: true,
        ..Default::default()
    });

    let window = entity(mock);
    assert_eq!(window.title(), "Terminal");
    assert_eq!(
        window.rect(),
        Rectangle::from_loc_and_size((12, 23), (296, 190))
    );
    assert_eq!((window.width(), window.height()), (296, 190));
    assert!(window.is_visible());
    assert!(window.is_alt_tab_window());
    assert!(!window.is_minimized());
}

#[test]
fn test_dead_entity_never_reaches_engine() {
    // No expectations: any engine call would panic.
    let mut window = entity(MockCaptureEngine::new());
    window.mark_dead();

    assert!(!window.is_alive());
    assert_eq!(window.title(), "");
    assert_eq!(window.class_name(), "");
    assert_eq!(window.raw_rect(), Rectangle::default());
    assert_eq!(window.rect(), Rectangle::default());
    assert_eq!(window.z_order(), 0);
    assert_eq!(window.owner_handle(), NativeHandle::NULL);
    assert_eq!(window.flags(), WindowFlags::default());
    assert_eq!(window.capture_mode(), CaptureMode::None);
    assert!(!window.cursor_draw());
    assert!(window.pixels(0, 0, 1, 1).is_none());
    assert!(window.texture().is_none());
    window.set_capture_mode(CaptureMode::BitBlt);
    window.request_update_title();

    let allocator = HeadlessEngine::new();
    assert!(!window.request_capture(CapturePriority::High, &allocator));
    assert!(!window.request_capture_icon());
}

#[test]
fn test_auto_request_is_sent_as_high() {
    let mut mock = MockCaptureEngine::new();
    mock.expect_window_texture_size().returning(|_| (64, 32));
    mock.expect_bind_texture_pointer().times(1).returning(|_, _| ());
    mock.expect_request_capture()
        .with(eq(WindowId(7)), eq(CapturePriority::High))
        .times(1)
        .returning(|_, _| ());

    let allocator = HeadlessEngine::new();
    let mut window = entity(mock);
    assert!(window.request_capture(CapturePriority::Auto, &allocator));
    assert_eq!(window.pending_texture().map(Texture::size), Some((64, 32)));
    assert_eq!(allocator.live_textures(), 1);

    window.release_textures(&allocator);
    assert_eq!(allocator.live_textures(), 0);
}

#[test]
fn test_captured_notification_sees_swapped_texture() {
    let mut mock = MockCaptureEngine::new();
    mock.expect_window_texture_size().returning(|_| (16, 16));
    mock.expect_bind_texture_pointer().returning(|_, _| ());
    mock.expect_request_capture().returning(|_, _| ());

    let allocator = HeadlessEngine::new();
    let mut window = entity(mock);
    let seen = Rc::new(Cell::new((0, 0)));
    let sink = seen.clone();
    window.on_captured(move |w| sink.set(w.texture_size()));

    window.request_capture(CapturePriority::Low, &allocator);
    window.handle_captured(&allocator);

    assert_eq!(seen.get(), (16, 16));
    assert_eq!(window.texture_phase(), TexturePhase::Stable);
    window.release_textures(&allocator);
}

#[test]
fn test_child_notifications_use_taken_signal() {
    let mut parent = entity(MockCaptureEngine::new());
    let child = WindowEntity::new(
        WindowId(8),
        NativeHandle(0x80),
        Some(ParentLink {
            id: WindowId(7),
            handle: NativeHandle(0x70),
        }),
        WindowKind::Child,
        Arc::new(MockCaptureEngine::new()),
    );

    let added = Rc::new(Cell::new(None));
    let sink = added.clone();
    parent.on_child_added(move |c| sink.set(Some(c.id())));
    parent.emit_child_added(&child);
    parent.emit_child_added(&child);

    assert_eq!(added.get(), Some(WindowId(8)));
    assert_eq!(parent.events_mut().child_added.len(), 1);
    assert!(child.is_child());
    assert_eq!(child.parent_id(), Some(WindowId(7)));
}

#[test]
fn test_request_skipped_without_bound_texture() {
    // No request_capture expectation: reaching the engine would panic.
    let mut mock = MockCaptureEngine::new();
    mock.expect_window_texture_size().returning(|_| (0, 0));

    let allocator = HeadlessEngine::new();
    let mut window = entity(mock);
    assert!(!window.request_capture(CapturePriority::High, &allocator));
    assert_eq!(window.texture_phase(), TexturePhase::NoTexture);
    assert_eq!(allocator.live_textures(), 0);
}
