//! Ranked backend list for one catalog entry.

use std::cmp::Reverse;

use crate::backends::SharedBackend;

/// The backends currently serving one metric, ordered by descending
/// priority; ties keep insertion order. N is the number of configured
/// backends, so linear scans are fine.
#[derive(Default, Clone)]
pub(crate) struct RankedBackends(Vec<SharedBackend>);

impl RankedBackends {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Insert the backend or refresh its entry, keeping the order invariant.
    pub fn add_or_update(&mut self, backend: &SharedBackend) {
        match self.position_of(backend.name()) {
            Some(found) => self.0[found] = backend.clone(),
            None => self.0.push(backend.clone()),
        }
        // stable sort preserves insertion order between equal priorities
        self.0
            .sort_by_key(|b| Reverse(b.configuration().priority));
    }

    /// Drop the named backend; reports whether the list is now empty.
    pub fn remove(&mut self, backend_name: &str) -> bool {
        if let Some(found) = self.position_of(backend_name) {
            self.0.remove(found);
        }
        self.0.is_empty()
    }

    /// Highest-priority backend.
    pub fn best(&self) -> Option<&SharedBackend> {
        self.0.first()
    }

    pub fn contains(&self, backend_name: &str) -> bool {
        self.position_of(backend_name).is_some()
    }

    fn position_of(&self, backend_name: &str) -> Option<usize> {
        self.0.iter().position(|b| b.name() == backend_name)
    }
}
