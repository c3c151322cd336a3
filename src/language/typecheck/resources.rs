use crate::language::span::Span;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(super) struct ResourceId(usize);

#[derive(Clone, Debug)]
pub(super) struct TrackedResource {
    pub name: String,
    pub declared: Span,
    pub invalidated: Option<Span>,
}

/// Move/destroy state of every resource-typed variable in scope.
///
/// Branches are checked against snapshots and joined afterwards: a resource
/// counts as invalidated when any branch that falls through invalidated it.
#[derive(Clone, Debug, Default)]
pub(super) struct ResourceTracker {
    resources: HashMap<ResourceId, TrackedResource>,
    next: usize,
}

impl ResourceTracker {
    pub fn track(&mut self, name: &str, declared: Span) -> ResourceId {
        let id = ResourceId(self.next);
        self.next += 1;
        self.resources.insert(
            id,
            TrackedResource {
                name: name.to_string(),
                declared,
                invalidated: None,
            },
        );
        id
    }

    pub fn get(&self, id: ResourceId) -> Option<&TrackedResource> {
        self.resources.get(&id)
    }

    pub fn is_invalidated(&self, id: ResourceId) -> bool {
        self.resources
            .get(&id)
            .is_some_and(|resource| resource.invalidated.is_some())
    }

    pub fn invalidate(&mut self, id: ResourceId, at: Span) {
        if let Some(resource) = self.resources.get_mut(&id) {
            resource.invalidated.get_or_insert(at);
        }
    }

    /// A new resource was moved into the variable.
    pub fn revalidate(&mut self, id: ResourceId) {
        if let Some(resource) = self.resources.get_mut(&id) {
            resource.invalidated = None;
        }
    }

    pub fn release(&mut self, id: ResourceId) -> Option<TrackedResource> {
        self.resources.remove(&id)
    }

    /// Joins the state of two branches that both fall through.
    pub fn join(&mut self, other: &ResourceTracker) {
        for (id, resource) in &other.resources {
            if let (Some(at), Some(mine)) = (resource.invalidated, self.resources.get_mut(id)) {
                mine.invalidated.get_or_insert(at);
            }
        }
        self.next = self.next.max(other.next);
    }

    /// Adopts the state of a single surviving branch, keeping ID allocation monotonic.
    pub fn adopt(&mut self, other: ResourceTracker) {
        let next = self.next.max(other.next);
        *self = other;
        self.next = next;
    }

    /// Resources valid in `before` but invalidated in `self`.
    pub fn newly_invalidated(&self, before: &ResourceTracker) -> Vec<(ResourceId, TrackedResource)> {
        let mut found: Vec<(ResourceId, TrackedResource)> = self
            .resources
            .iter()
            .filter(|(id, resource)| resource.invalidated.is_some() && before.resources.get(id).is_some_and(|old| old.invalidated.is_none()))
            .map(|(id, resource)| (*id, resource.clone()))
            .collect();
        found.sort_by_key(|(id, _)| id.0);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_keeps_invalidation_from_either_branch() {
        let mut tracker = ResourceTracker::default();
        let r = tracker.track("r", Span::default());
        let s = tracker.track("s", Span::default());

        let mut then_branch = tracker.clone();
        then_branch.invalidate(r, Span::new(1, 2));
        let else_branch = tracker.clone();

        let mut joined = then_branch;
        joined.join(&else_branch);
        assert!(joined.is_invalidated(r));
        assert!(!joined.is_invalidated(s));
        assert_eq!(joined.newly_invalidated(&tracker).len(), 1);
    }

    #[test]
    fn revalidation_after_move_in() {
        let mut tracker = ResourceTracker::default();
        let r = tracker.track("r", Span::default());
        tracker.invalidate(r, Span::default());
        tracker.revalidate(r);
        assert!(!tracker.is_invalidated(r));
        assert_eq!(tracker.release(r).map(|resource| resource.name), Some("r".to_string()));
    }
}
