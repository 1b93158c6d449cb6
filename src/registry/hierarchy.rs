//! Parent resolution for newly reported windows
//!
//! The engine does not always know a window's parent. Resolution order:
//!
//! 1. explicit parent id reported by the engine (must already be registered)
//! 2. owner handle matched against registered windows
//! 3. optionally, for windows the engine flags as children, the lowest-id
//!    registered top-level window of the same process and thread
//!
//! A window whose parent cannot be resolved at registration time stays a
//! root; links are never added retroactively.

use super::Registry;
use crate::engine::{CaptureEngine, WindowId};
use log::trace;

/// Parent-resolution knobs, taken from the `[hierarchy]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HierarchyPolicy {
    pub process_thread_fallback: bool,
}

impl Default for HierarchyPolicy {
    fn default() -> Self {
        Self {
            process_thread_fallback: true,
        }
    }
}

pub fn resolve_parent(
    registry: &Registry,
    engine: &dyn CaptureEngine,
    id: WindowId,
    policy: HierarchyPolicy,
) -> Option<WindowId> {
    if let Some(parent_id) = engine.window_parent_id(id) {
        if parent_id == id {
            return None;
        }
        return match registry.get(parent_id) {
            Some(parent) if parent.is_alive() => Some(parent_id),
            _ => {
                trace!("Parent {} of {} arrived late or is gone", parent_id, id);
                None
            }
        };
    }

    let owner = engine.window_owner_handle(id);
    if !owner.is_null() {
        if let Some(parent) = registry.find_by_handle(owner) {
            if parent.id() != id && parent.is_alive() {
                return Some(parent.id());
            }
        }
    }

    if policy.process_thread_fallback && engine.window_flags(id).child {
        let process = engine.window_process_id(id);
        let thread = engine.window_thread_id(id);
        return registry
            .find(|candidate| {
                candidate.id() != id
                    && candidate.is_alive()
                    && candidate.is_root()
                    && !candidate.is_desktop()
                    && candidate.process_id() == process
                    && candidate.thread_id() == thread
            })
            .map(|parent| parent.id());
    }

    None
}
