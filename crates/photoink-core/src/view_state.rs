//! Insertion-ordered log of visible layers plus the redo stack.

use crate::error::ViewStateError;
use crate::overlay::OverlayId;

/// Handle to an entry of the view log.
///
/// `Strokes` is the sentinel standing for the whole brush-stroke layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewHandle {
    Strokes,
    Overlay(OverlayId),
}

impl ViewHandle {
    /// The overlay id, if this is not the stroke sentinel.
    pub fn overlay_id(self) -> Option<OverlayId> {
        match self {
            ViewHandle::Overlay(id) => Some(id),
            ViewHandle::Strokes => None,
        }
    }
}

impl From<OverlayId> for ViewHandle {
    fn from(id: OverlayId) -> Self {
        ViewHandle::Overlay(id)
    }
}

/// Ordered `added` log (back to front), `redo` stack and current selection.
///
/// Invariants, checked after every mutation in debug builds:
/// - `added` entries are unique,
/// - the selection, if any, is an overlay present in `added`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    added: Vec<ViewHandle>,
    redo: Vec<ViewHandle>,
    selected: Option<OverlayId>,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handle on top of the log.
    pub fn append(&mut self, handle: ViewHandle) -> Result<(), ViewStateError> {
        if self.added.contains(&handle) {
            return Err(ViewStateError::AlreadyPresent(handle));
        }
        self.added.push(handle);
        self.debug_check();
        Ok(())
    }

    /// Pop the topmost handle and push it onto the redo stack.
    pub fn remove_last(&mut self) -> Option<ViewHandle> {
        let handle = self.added.pop()?;
        self.redo.push(handle);
        self.drop_selection_of(handle);
        self.debug_check();
        Some(handle)
    }

    /// Remove a specific handle, keeping the relative order of the rest,
    /// and push it onto the redo stack. Returns false if it was absent.
    pub fn remove_at(&mut self, handle: ViewHandle) -> bool {
        let Some(pos) = self.added.iter().position(|&h| h == handle) else {
            return false;
        };
        self.added.remove(pos);
        self.redo.push(handle);
        self.drop_selection_of(handle);
        self.debug_check();
        true
    }

    /// Push a handle onto the redo stack without touching `added`.
    ///
    /// Used for stroke undos that leave the stroke layer visible.
    pub fn push_redo(&mut self, handle: ViewHandle) {
        self.redo.push(handle);
    }

    /// Pop the top of the redo stack. The caller re-appends it.
    pub fn pop_redo(&mut self) -> Option<ViewHandle> {
        self.redo.pop()
    }

    /// Top of the redo stack.
    pub fn peek_redo(&self) -> Option<ViewHandle> {
        self.redo.last().copied()
    }

    pub fn clear_redo(&mut self) {
        self.redo.clear();
    }

    pub fn clear_added(&mut self) {
        self.added.clear();
        self.selected = None;
    }

    pub fn contains(&self, handle: ViewHandle) -> bool {
        self.added.contains(&handle)
    }

    pub fn count(&self) -> usize {
        self.added.len()
    }

    pub fn get(&self, index: usize) -> Option<ViewHandle> {
        self.added.get(index).copied()
    }

    /// Topmost handle.
    pub fn last(&self) -> Option<ViewHandle> {
        self.added.last().copied()
    }

    pub fn redo_count(&self) -> usize {
        self.redo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
    }

    /// Handles in z-order (back to front).
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = ViewHandle> + '_ {
        self.added.iter().copied()
    }

    /// Handles on the redo stack, bottom first.
    pub fn redo_iter(&self) -> impl Iterator<Item = ViewHandle> + '_ {
        self.redo.iter().copied()
    }

    /// Select an overlay. Ignored unless the overlay is in `added`.
    pub fn select(&mut self, id: OverlayId) -> bool {
        if !self.contains(ViewHandle::Overlay(id)) {
            return false;
        }
        self.selected = Some(id);
        true
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn current_selection(&self) -> Option<OverlayId> {
        self.selected
    }

    fn drop_selection_of(&mut self, handle: ViewHandle) {
        if let ViewHandle::Overlay(id) = handle {
            if self.selected == Some(id) {
                self.selected = None;
            }
        }
    }

    fn debug_check(&self) {
        debug_assert!(
            self.added
                .iter()
                .enumerate()
                .all(|(i, h)| !self.added[i + 1..].contains(h)),
            "duplicate handle in view log"
        );
        debug_assert!(
            self.selected
                .is_none_or(|id| self.added.contains(&ViewHandle::Overlay(id))),
            "selection outside view log"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn handle() -> (OverlayId, ViewHandle) {
        let id = Uuid::new_v4();
        (id, ViewHandle::Overlay(id))
    }

    #[test]
    fn test_append_rejects_duplicates() {
        let mut state = ViewState::new();
        let (_, h) = handle();
        assert!(state.append(h).is_ok());
        assert_eq!(state.append(h), Err(ViewStateError::AlreadyPresent(h)));
        assert_eq!(state.count(), 1);
    }

    #[test]
    fn test_remove_last_pushes_redo() {
        let mut state = ViewState::new();
        let (_, a) = handle();
        let (_, b) = handle();
        state.append(a).unwrap();
        state.append(b).unwrap();

        assert_eq!(state.remove_last(), Some(b));
        assert_eq!(state.count(), 1);
        assert_eq!(state.peek_redo(), Some(b));
        assert_eq!(state.pop_redo(), Some(b));
        assert_eq!(state.redo_count(), 0);
    }

    #[test]
    fn test_remove_at_preserves_order() {
        let mut state = ViewState::new();
        let handles: Vec<_> = (0..3).map(|_| handle().1).collect();
        for &h in &handles {
            state.append(h).unwrap();
        }

        assert!(state.remove_at(handles[1]));
        assert_eq!(state.iter().collect::<Vec<_>>(), vec![handles[0], handles[2]]);
        assert_eq!(state.peek_redo(), Some(handles[1]));
        assert!(!state.remove_at(handles[1]));
    }

    #[test]
    fn test_selection_follows_membership() {
        let mut state = ViewState::new();
        let (id, h) = handle();
        let (stranger, _) = handle();

        assert!(!state.select(id));
        state.append(h).unwrap();
        assert!(state.select(id));
        assert!(!state.select(stranger));
        assert_eq!(state.current_selection(), Some(id));

        state.remove_at(h);
        assert_eq!(state.current_selection(), None);
    }

    #[test]
    fn test_clear_added_drops_selection() {
        let mut state = ViewState::new();
        let (id, h) = handle();
        state.append(h).unwrap();
        state.append(ViewHandle::Strokes).unwrap();
        state.select(id);

        state.clear_added();
        assert!(state.is_empty());
        assert_eq!(state.current_selection(), None);
    }

    #[test]
    fn test_empty_remove_last() {
        let mut state = ViewState::new();
        assert_eq!(state.remove_last(), None);
        assert_eq!(state.redo_count(), 0);
    }
}
