use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::model::{catalog_order, Instance};

/// In-memory list of every known instance.
///
/// Readers (the UI) and the background reconciler share one lock. A
/// reconciliation swaps the whole membership at once, so values read before
/// a swap may be stale afterwards.
#[derive(Debug, Default)]
pub struct Catalog {
    instances: RwLock<Vec<Instance>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Instance>> {
        self.instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Instance>> {
        self.instances
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Instance> {
        self.read().get(index).cloned()
    }

    /// Case-insensitive lookup by identifier.
    pub fn find(&self, name: &str) -> Option<Instance> {
        self.read().iter().find(|i| i.is_named(name)).cloned()
    }

    pub fn snapshot(&self) -> Vec<Instance> {
        self.read().clone()
    }

    pub fn selected(&self) -> Vec<Instance> {
        self.read().iter().filter(|i| i.selected).cloned().collect()
    }

    /// Sort by priority, then title. Applied on demand only.
    pub fn sort(&self) {
        self.write().sort_by(catalog_order);
    }

    /// Atomically replace the whole membership.
    pub(crate) fn replace(&self, instances: Vec<Instance>) -> usize {
        let mut guard = self.write();
        *guard = instances;
        guard.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str, priority: i32, selected: bool) -> Instance {
        let mut instance = Instance::new(name, format!("/tmp/{name}"));
        instance.priority = priority;
        instance.selected = selected;
        instance
    }

    #[test]
    fn replace_swaps_membership() {
        let catalog = Catalog::new();
        assert!(catalog.is_empty());

        catalog.replace(vec![named("a", 0, true), named("b", 0, false)]);
        assert_eq!(catalog.len(), 2);

        catalog.replace(vec![named("c", 0, true)]);
        assert_eq!(catalog.len(), 1);
        assert!(catalog.find("a").is_none());
        assert_eq!(catalog.get(0).unwrap().name, "c");
    }

    #[test]
    fn find_ignores_case_and_selected_filters() {
        let catalog = Catalog::new();
        catalog.replace(vec![named("Alpha", 0, true), named("beta", 0, false)]);

        assert_eq!(catalog.find("ALPHA").unwrap().name, "Alpha");
        let selected: Vec<_> = catalog.selected().into_iter().map(|i| i.name).collect();
        assert_eq!(selected, vec!["Alpha"]);
    }

    #[test]
    fn sort_orders_by_priority_descending() {
        let catalog = Catalog::new();
        catalog.replace(vec![named("low", 1, true), named("high", 9, true)]);
        catalog.sort();
        assert_eq!(catalog.get(0).unwrap().name, "high");
        assert!(catalog.get(2).is_none());
    }
}
