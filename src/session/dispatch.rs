//! Message Dispatcher
//!
//! Applies one engine message to the registry and entities as a single step.
//! Messages naming an id the registry no longer holds are benign races
//! (a capture that completed after its window closed) and are dropped.

use super::{Session, TickReport};
use crate::engine::{Message, MessageKind, WindowId};
use crate::registry::hierarchy::{resolve_parent, HierarchyPolicy};
use log::{debug, trace};

pub(super) fn dispatch(session: &mut Session, message: Message, report: &mut TickReport) {
    report.messages += 1;

    if message.kind == MessageKind::CursorCaptured {
        session.cursor.handle_captured();
        return;
    }

    let Some(id) = message.window_id else {
        trace!("{:?} message without a window id", message.kind);
        report.ignored += 1;
        return;
    };

    match message.kind {
        MessageKind::WindowAdded => window_added(session, id, report),
        MessageKind::WindowRemoved => window_removed(session, id, report),
        MessageKind::WindowCaptured => {
            let allocator = session.allocator.as_ref();
            match session.registry.get_mut(id) {
                Some(window) => {
                    window.handle_captured(allocator);
                    report.captures_completed += 1;
                }
                None => ignore(message, report),
            }
        }
        MessageKind::WindowSizeChanged => match session.registry.get_mut(id) {
            Some(window) => window.handle_size_changed(),
            None => ignore(message, report),
        },
        MessageKind::IconCaptured => match session.registry.get_mut(id) {
            Some(window) => window.handle_icon_captured(),
            None => ignore(message, report),
        },
        MessageKind::TextureNullError | MessageKind::TextureSizeError => {
            let allocator = session.allocator.as_ref();
            match session.registry.get_mut(id) {
                Some(window) => {
                    debug!("{:?} for window {}; re-provisioning", message.kind, id);
                    window.reset_texture(allocator);
                    report.texture_errors += 1;
                }
                None => ignore(message, report),
            }
        }
        MessageKind::CursorCaptured => {}
    }
}

fn ignore(message: Message, report: &mut TickReport) {
    trace!("Ignoring {:?} for unregistered window {:?}", message.kind, message.window_id);
    report.ignored += 1;
}

fn window_added(session: &mut Session, id: WindowId, report: &mut TickReport) {
    let engine = session.engine.clone();
    let policy = HierarchyPolicy::from(&session.config.hierarchy);

    let parent = resolve_parent(&session.registry, engine.as_ref(), id, policy);
    let handle = engine.window_handle(id);
    let is_desktop = engine.window_flags(id).desktop;

    let allocator = session.allocator.as_ref();
    let Some(window) = session.registry.register(id, handle, parent, is_desktop, engine) else {
        return;
    };
    window.provision_icon(allocator);

    if window.is_desktop() {
        session.events.desktop_added.emit(window);
    } else {
        session.events.window_added.emit(window);
    }
    report.windows_added += 1;
}

fn window_removed(session: &mut Session, id: WindowId, report: &mut TickReport) {
    let Some(mut window) = session.registry.unregister(id) else {
        ignore(Message::window(MessageKind::WindowRemoved, id), report);
        return;
    };
    session.scheduler.unschedule(id);

    if window.is_desktop() {
        session.events.desktop_removed.emit(&window);
    } else {
        session.events.window_removed.emit(&window);
    }
    window.release_textures(session.allocator.as_ref());
    report.windows_removed += 1;
}
