//! Window Registry
//!
//! Single source of truth for which windows currently exist and how they
//! are linked. The registry exclusively owns every [`WindowEntity`]; a
//! parent is only ever referenced by id and resolved through the map, so
//! removing a window can never leave an owning pointer behind.
//!
//! Iteration is in ascending [`WindowId`] order, which makes every linear
//! search deterministic.

pub mod hierarchy;

use crate::engine::{CaptureEngine, NativeHandle, WindowId};
use crate::window::{ParentLink, WindowEntity, WindowKind};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct Registry {
    /// Window tracking by ID
    windows: BTreeMap<WindowId, WindowEntity>,

    /// Desktop ids in discovery order
    desktops: Vec<WindowId>,

    /// Window currently under the OS cursor, refreshed every tick
    cursor_window: Option<WindowId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and insert the entity for `id`.
    ///
    /// A duplicate id is refused and the first registration kept. `parent`
    /// is linked only if it names a live entity and linking cannot create a
    /// cycle; the parent's `child_added` listeners then receive the new
    /// entity.
    pub fn register(
        &mut self,
        id: WindowId,
        handle: NativeHandle,
        parent: Option<WindowId>,
        is_desktop: bool,
        engine: Arc<dyn CaptureEngine>,
    ) -> Option<&mut WindowEntity> {
        if self.windows.contains_key(&id) {
            warn!("⚠️ Window {} is already registered; keeping the first registration", id);
            return None;
        }

        let link = parent.and_then(|parent_id| self.linkable_parent(id, parent_id));
        let kind = if is_desktop {
            WindowKind::Desktop
        } else if link.is_some() {
            WindowKind::Child
        } else {
            WindowKind::Window
        };

        let entity = WindowEntity::new(id, handle, link, kind, engine);
        if let Some(link) = link {
            if let Some(parent) = self.windows.get_mut(&link.id) {
                parent.emit_child_added(&entity);
            }
        }
        if kind == WindowKind::Desktop {
            self.desktops.push(id);
        }

        debug!("Registered window {} ({:?}, parent: {:?})", id, kind, link.map(|l| l.id));
        self.windows.insert(id, entity);
        self.windows.get_mut(&id)
    }

    fn linkable_parent(&self, id: WindowId, parent_id: WindowId) -> Option<ParentLink> {
        let parent = match self.windows.get(&parent_id) {
            Some(parent) if parent.is_alive() => parent,
            _ => {
                debug!(
                    "Parent {} of window {} is not registered; treating it as a root",
                    parent_id, id
                );
                return None;
            }
        };
        if self.would_cycle(id, parent_id) {
            warn!(
                "⚠️ Refusing to link window {} under {}: the parent chain would form a cycle",
                id, parent_id
            );
            return None;
        }
        Some(ParentLink {
            id: parent_id,
            handle: parent.handle(),
        })
    }

    /// Whether `id` appears in the resolved ancestor chain of `parent_id`
    /// (including `parent_id` itself).
    pub fn would_cycle(&self, id: WindowId, parent_id: WindowId) -> bool {
        let mut current = Some(parent_id);
        let mut steps = 0;
        while let Some(ancestor) = current {
            if ancestor == id {
                return true;
            }
            steps += 1;
            if steps > self.windows.len() {
                return true;
            }
            current = self.parent_of(ancestor).map(WindowEntity::id);
        }
        false
    }

    /// Remove `id`, mark it dead and notify its parent. Children that the
    /// engine has not reported removed stay registered; their parent link
    /// then resolves to `None`.
    pub fn unregister(&mut self, id: WindowId) -> Option<WindowEntity> {
        let mut entity = self.windows.remove(&id)?;
        entity.mark_dead();

        if let Some(link) = entity.parent_link() {
            if let Some(parent) = self.windows.get_mut(&link.id) {
                if parent.handle() == link.handle {
                    parent.emit_child_removed(&entity);
                }
            }
        }
        if entity.kind() == WindowKind::Desktop {
            self.desktops.retain(|desktop| *desktop != id);
        }
        if self.cursor_window == Some(id) {
            self.cursor_window = None;
        }

        debug!("Unregistered window {}", id);
        Some(entity)
    }

    pub fn get(&self, id: WindowId) -> Option<&WindowEntity> {
        self.windows.get(&id)
    }

    pub fn get_mut(&mut self, id: WindowId) -> Option<&mut WindowEntity> {
        self.windows.get_mut(&id)
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.windows.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = WindowId> + '_ {
        self.windows.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WindowEntity> {
        self.windows.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut WindowEntity> {
        self.windows.values_mut()
    }

    pub(crate) fn drain(&mut self) -> Vec<WindowEntity> {
        self.desktops.clear();
        self.cursor_window = None;
        std::mem::take(&mut self.windows).into_values().collect()
    }

    /// Resolve the parent of `id`. A parent that has been removed (or whose
    /// id now names a different window) resolves to `None`.
    pub fn parent_of(&self, id: WindowId) -> Option<&WindowEntity> {
        let link = self.windows.get(&id)?.parent_link()?;
        self.windows
            .get(&link.id)
            .filter(|parent| parent.handle() == link.handle)
    }

    /// Registered children linked to `id`, in ascending id order.
    pub fn children_of(&self, id: WindowId) -> Vec<WindowId> {
        self.windows
            .values()
            .filter(|window| window.parent_id() == Some(id))
            .filter(|window| self.parent_of(window.id()).is_some())
            .map(WindowEntity::id)
            .collect()
    }

    pub fn find(&self, mut predicate: impl FnMut(&WindowEntity) -> bool) -> Option<&WindowEntity> {
        self.windows.values().find(|window| predicate(window))
    }

    /// First window whose title starts with `partial`; failing that, the
    /// first window whose title contains it anywhere.
    pub fn find_by_title(&self, partial: &str, alt_tab_only: bool) -> Option<&WindowEntity> {
        let mut fallback = None;
        for window in self.windows.values() {
            if alt_tab_only && !window.is_alt_tab_window() {
                continue;
            }
            let title = window.title();
            if title.starts_with(partial) {
                return Some(window);
            }
            if fallback.is_none() && title.contains(partial) {
                fallback = Some(window);
            }
        }
        fallback
    }

    pub fn find_all_by_title(&self, partial: &str) -> Vec<&WindowEntity> {
        self.windows
            .values()
            .filter(|window| window.title().contains(partial))
            .collect()
    }

    pub fn find_by_handle(&self, handle: NativeHandle) -> Option<&WindowEntity> {
        self.windows.values().find(|window| window.handle() == handle)
    }

    pub fn find_desktop(&self, index: usize) -> Option<&WindowEntity> {
        let id = self.desktops.get(index)?;
        self.windows.get(id)
    }

    pub fn desktops(&self) -> &[WindowId] {
        &self.desktops
    }

    pub fn desktop_count(&self) -> usize {
        self.desktops.len()
    }

    pub fn cursor_window(&self) -> Option<&WindowEntity> {
        self.windows.get(&self.cursor_window?)
    }

    pub fn cursor_window_id(&self) -> Option<WindowId> {
        self.cursor_window
    }

    pub(crate) fn set_cursor_window(&mut self, id: Option<WindowId>) {
        self.cursor_window = id.filter(|id| self.windows.contains_key(id));
    }
}
