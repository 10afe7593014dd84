//! The set of selected hosts and their legend roles.

use std::collections::BTreeMap;

use crate::model::HostId;
use crate::observe::{Hub, Subscription};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SelectionRole {
    Source,
    Target,
    SourceAndTarget,
}

impl SelectionRole {
    fn merge(self, other: Self) -> Self {
        if self == other { self } else { Self::SourceAndTarget }
    }
}

/// Published after every mutation that changed membership or roles.
pub type SelectionSnapshot = BTreeMap<HostId, Option<SelectionRole>>;

#[derive(Default)]
pub struct SelectionManager {
    members: BTreeMap<HostId, Option<SelectionRole>>,
    changes: Hub<SelectionSnapshot>,
}

impl SelectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription<SelectionSnapshot> {
        self.changes.subscribe()
    }

    pub fn contains(&self, id: HostId) -> bool {
        self.members.contains_key(&id)
    }

    pub fn role(&self, id: HostId) -> Option<SelectionRole> {
        self.members.get(&id).copied().flatten()
    }

    pub fn ids(&self) -> Vec<HostId> {
        self.members.keys().copied().collect()
    }

    pub fn snapshot(&self) -> SelectionSnapshot {
        self.members.clone()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn sources(&self) -> Vec<HostId> {
        self.with_role(|role| matches!(role, SelectionRole::Source | SelectionRole::SourceAndTarget))
    }

    pub fn targets(&self) -> Vec<HostId> {
        self.with_role(|role| matches!(role, SelectionRole::Target | SelectionRole::SourceAndTarget))
    }

    fn with_role(&self, keep: impl Fn(SelectionRole) -> bool) -> Vec<HostId> {
        self.members
            .iter()
            .filter_map(|(&id, role)| role.filter(|role| keep(*role)).map(|_| id))
            .collect()
    }

    /// Adds untagged members; existing members keep their role.
    pub fn add(&mut self, ids: impl IntoIterator<Item = HostId>) -> bool {
        let mut changed = false;
        for id in ids {
            if !self.members.contains_key(&id) {
                self.members.insert(id, None);
                changed = true;
            }
        }
        self.notify_if(changed)
    }

    pub fn remove(&mut self, ids: impl IntoIterator<Item = HostId>) -> bool {
        let mut changed = false;
        for id in ids {
            changed |= self.members.remove(&id).is_some();
        }
        self.notify_if(changed)
    }

    pub fn toggle(&mut self, id: HostId) -> bool {
        if self.members.remove(&id).is_none() {
            self.members.insert(id, None);
        }
        self.notify_if(true)
    }

    pub fn clear(&mut self) -> bool {
        let changed = !self.members.is_empty();
        self.members.clear();
        self.notify_if(changed)
    }

    /// Replaces the selection with untagged members.
    pub fn replace(&mut self, ids: impl IntoIterator<Item = HostId>) -> bool {
        let next: BTreeMap<HostId, Option<SelectionRole>> =
            ids.into_iter().map(|id| (id, None)).collect();
        let changed = next != self.members;
        self.members = next;
        self.notify_if(changed)
    }

    /// Replaces the selection with role-tagged sources and targets. A host in
    /// both lists is tagged `SourceAndTarget`.
    pub fn select_with_roles(&mut self, sources: &[HostId], targets: &[HostId]) -> bool {
        let mut next: BTreeMap<HostId, Option<SelectionRole>> = BTreeMap::new();
        let tagged = sources
            .iter()
            .map(|&id| (id, SelectionRole::Source))
            .chain(targets.iter().map(|&id| (id, SelectionRole::Target)));
        for (id, role) in tagged {
            let merged = match next.get(&id).copied().flatten() {
                Some(existing) => existing.merge(role),
                None => role,
            };
            next.insert(id, Some(merged));
        }

        let changed = next != self.members;
        self.members = next;
        self.notify_if(changed)
    }

    fn notify_if(&self, changed: bool) -> bool {
        if changed {
            self.changes.publish(self.members.clone());
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_exclusive_per_host() {
        let mut selection = SelectionManager::new();
        selection.select_with_roles(&[1, 2], &[2, 3]);

        assert_eq!(selection.role(1), Some(SelectionRole::Source));
        assert_eq!(selection.role(2), Some(SelectionRole::SourceAndTarget));
        assert_eq!(selection.role(3), Some(SelectionRole::Target));
        assert_eq!(selection.sources(), vec![1, 2]);
        assert_eq!(selection.targets(), vec![2, 3]);
    }

    #[test]
    fn clear_removes_members_and_tags() {
        let mut selection = SelectionManager::new();
        selection.select_with_roles(&[1], &[4]);
        assert!(selection.clear());
        assert!(selection.is_empty());
        assert_eq!(selection.role(1), None);
        assert!(!selection.clear());
    }

    #[test]
    fn notifies_only_on_change() {
        let mut selection = SelectionManager::new();
        let changes = selection.subscribe();

        selection.add([1, 2]);
        selection.add([2]);
        selection.remove([9]);
        selection.toggle(1);

        let published = changes.drain();
        assert_eq!(published.len(), 2);
        assert_eq!(published[1].keys().copied().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn add_keeps_existing_role() {
        let mut selection = SelectionManager::new();
        selection.select_with_roles(&[5], &[]);
        selection.add([5, 6]);
        assert_eq!(selection.role(5), Some(SelectionRole::Source));
        assert_eq!(selection.role(6), None);
        assert!(selection.contains(6));
    }
}
