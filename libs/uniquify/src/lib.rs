//! A library for assigning unique names.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

/// A set of unique names.
///
/// Each key of type `K` is assigned a unique name. Names of released keys
/// become available again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Names<K: Hash + Eq> {
    names: HashSet<ArcStr>,
    assignments: HashMap<K, ArcStr>,
}

impl<K: Hash + Eq> Default for Names<K> {
    fn default() -> Self {
        Self {
            names: HashSet::new(),
            assignments: HashMap::new(),
        }
    }
}

impl<K: Hash + Eq> Names<K> {
    /// Creates a new, empty name set.
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the name associated with this key, if it exists.
    pub fn name(&self, id: &K) -> Option<ArcStr> {
        self.assignments.get(id).cloned()
    }

    /// Returns `true` if `name` is currently taken.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// The number of assigned names.
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Returns `true` if no names are assigned.
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Returns the first name derived from `base_name` that is not taken.
    ///
    /// Candidates are `base_name`, then `base_name_1`, `base_name_2`, and so on.
    pub fn unique_name(&self, base_name: &str) -> ArcStr {
        if !self.names.contains(base_name) {
            return base_name.into();
        }
        let mut i = 1;
        loop {
            let name = arcstr::format!("{}_{}", base_name, i);
            if !self.names.contains(&name) {
                return name;
            }
            i += 1;
        }
    }

    /// Allocates a new, unique name associated with the given ID.
    ///
    /// The name will be based on the given `base_name`. Any name previously
    /// assigned to `id` is released first.
    pub fn assign_name(&mut self, id: K, base_name: &str) -> ArcStr {
        self.release(&id);
        let name = self.unique_name(base_name);
        self.names.insert(name.clone());
        self.assignments.insert(id, name.clone());
        name
    }

    /// Releases the name assigned to `id`, returning it.
    pub fn release(&mut self, id: &K) -> Option<ArcStr> {
        let name = self.assignments.remove(id)?;
        self.names.remove(&name);
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffixes_are_appended_on_conflict() {
        let mut names = Names::new();
        assert_eq!(names.assign_name(1, "inv"), "inv");
        assert_eq!(names.assign_name(2, "inv"), "inv_1");
        assert_eq!(names.assign_name(3, "inv"), "inv_2");
        assert_eq!(names.name(&2).as_deref(), Some("inv_1"));
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn released_names_are_reused() {
        let mut names = Names::new();
        names.assign_name(1, "a");
        names.assign_name(2, "a");
        assert_eq!(names.release(&1).as_deref(), Some("a"));
        assert!(!names.contains("a"));
        assert_eq!(names.assign_name(3, "a"), "a");
    }

    #[test]
    fn reassignment_frees_the_old_name() {
        let mut names = Names::new();
        names.assign_name(1, "top");
        assert_eq!(names.assign_name(1, "core"), "core");
        assert!(!names.contains("top"));
        assert_eq!(names.assign_name(2, "core"), "core_1");
    }
}
