//! Path-scoped revisit guard
//!
//! Objects are marked while they sit on the active traversal stack and
//! unmarked on the way out, so a shared object reached via two paths is
//! processed each time while a cycle along the current path is cut.

use std::collections::HashSet;

use expando_model::ObjectId;

#[derive(Debug, Default)]
pub(crate) struct PathGuard {
    on_path: HashSet<ObjectId>,
}

impl PathGuard {
    /// Mark `id` as on the path; false when it already is
    #[inline]
    pub(crate) fn enter(&mut self, id: ObjectId) -> bool {
        self.on_path.insert(id)
    }

    #[inline]
    pub(crate) fn leave(&mut self, id: ObjectId) {
        self.on_path.remove(&id);
    }
}
