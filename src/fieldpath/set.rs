//! Set type for field path tracking.

use super::path::Path;
use std::collections::{BTreeMap, BTreeSet};

/// Set is a tree of field paths.
///
/// A path `a.b.c` is stored as the member `c` of the child `b` of the child
/// `a` of the root. A node may be a member and have children at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Set {
    /// Paths that end at this level.
    pub members: BTreeSet<String>,
    /// Nested children for deeper paths.
    pub children: BTreeMap<String, Set>,
}

impl Set {
    /// Creates a new empty set.
    pub const fn new() -> Self {
        Set {
            members: BTreeSet::new(),
            children: BTreeMap::new(),
        }
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty() && self.children.is_empty()
    }

    /// Returns the number of paths in the set.
    pub fn len(&self) -> usize {
        self.members.len() + self.children.values().map(Set::len).sum::<usize>()
    }

    /// Returns true if the set contains the given path.
    pub fn has(&self, path: &Path) -> bool {
        let Some((last, parents)) = path.as_slice().split_last() else {
            return false;
        };
        match self.node(parents) {
            Some(node) => node.members.contains(last),
            None => false,
        }
    }

    /// Returns true if the set contains the path or any of its ancestors.
    pub fn covers(&self, path: &Path) -> bool {
        let mut node = self;
        for key in path {
            if node.members.contains(key) {
                return true;
            }
            match node.children.get(key) {
                Some(child) => node = child,
                None => return false,
            }
        }
        false
    }

    /// Returns true if the set contains any path strictly beneath `path`.
    pub fn has_descendants_of(&self, path: &Path) -> bool {
        match self.node(path.as_slice()) {
            Some(node) => !path.is_empty() && !node.is_empty(),
            None => false,
        }
    }

    /// Returns every path of the set strictly beneath `path`.
    pub fn descendants_of(&self, path: &Path) -> Vec<Path> {
        let mut out = Vec::new();
        if path.is_empty() {
            return out;
        }
        if let Some(node) = self.node(path.as_slice()) {
            node.iterate_with_path(&mut path.clone(), &mut |p| out.push(p.clone()));
        }
        out
    }

    fn node(&self, keys: &[String]) -> Option<&Set> {
        let mut node = self;
        for key in keys {
            node = node.children.get(key)?;
        }
        Some(node)
    }

    /// Inserts a path into the set. The empty path is ignored.
    pub fn insert(&mut self, path: &Path) {
        let Some((last, parents)) = path.as_slice().split_last() else {
            return;
        };
        let mut node = self;
        for key in parents {
            node = node.children.entry(key.clone()).or_default();
        }
        node.members.insert(last.clone());
    }

    /// Removes a path from the set, returning true if it was present.
    pub fn remove(&mut self, path: &Path) -> bool {
        self.remove_keys(path.as_slice())
    }

    fn remove_keys(&mut self, keys: &[String]) -> bool {
        let Some((first, rest)) = keys.split_first() else {
            return false;
        };
        if rest.is_empty() {
            return self.members.remove(first);
        }
        let Some(child) = self.children.get_mut(first) else {
            return false;
        };
        let removed = child.remove_keys(rest);
        if child.is_empty() {
            self.children.remove(first);
        }
        removed
    }

    /// Returns the union of two sets.
    pub fn union(&self, other: &Set) -> Set {
        let mut result = self.clone();
        result.union_into(other);
        result
    }

    fn union_into(&mut self, other: &Set) {
        self.members.extend(other.members.iter().cloned());

        for (key, other_child) in &other.children {
            if let Some(self_child) = self.children.get_mut(key) {
                self_child.union_into(other_child);
            } else {
                self.children.insert(key.clone(), other_child.clone());
            }
        }
    }

    /// Returns the intersection of two sets.
    pub fn intersection(&self, other: &Set) -> Set {
        let members = self.members.intersection(&other.members).cloned().collect();

        let mut children = BTreeMap::new();
        for (key, self_child) in &self.children {
            if let Some(other_child) = other.children.get(key) {
                let child = self_child.intersection(other_child);
                if !child.is_empty() {
                    children.insert(key.clone(), child);
                }
            }
        }

        Set { members, children }
    }

    /// Returns the difference of two sets (self - other).
    pub fn difference(&self, other: &Set) -> Set {
        let members = self.members.difference(&other.members).cloned().collect();

        let mut children = BTreeMap::new();
        for (key, self_child) in &self.children {
            if let Some(other_child) = other.children.get(key) {
                let child = self_child.difference(other_child);
                if !child.is_empty() {
                    children.insert(key.clone(), child);
                }
            } else {
                children.insert(key.clone(), self_child.clone());
            }
        }

        Set { members, children }
    }

    /// Iterates over all paths in the set.
    pub fn iterate<F>(&self, mut f: F)
    where
        F: FnMut(&Path),
    {
        self.iterate_with_path(&mut Path::new(), &mut f);
    }

    fn iterate_with_path<F>(&self, current_path: &mut Path, f: &mut F)
    where
        F: FnMut(&Path),
    {
        for member in &self.members {
            current_path.push(member.clone());
            f(current_path);
            current_path.pop();
        }

        for (key, child) in &self.children {
            current_path.push(key.clone());
            child.iterate_with_path(current_path, f);
            current_path.pop();
        }
    }

    /// Returns every path of the set.
    pub fn paths(&self) -> Vec<Path> {
        let mut out = Vec::with_capacity(self.len());
        self.iterate(|path| out.push(path.clone()));
        out
    }
}

impl FromIterator<Path> for Set {
    fn from_iter<T: IntoIterator<Item = Path>>(iter: T) -> Self {
        let mut set = Set::new();
        for path in iter {
            set.insert(&path);
        }
        set
    }
}

impl<'a> FromIterator<&'a Path> for Set {
    fn from_iter<T: IntoIterator<Item = &'a Path>>(iter: T) -> Self {
        let mut set = Set::new();
        for path in iter {
            set.insert(path);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn p(dotted: &str) -> Path {
        Path::parse(dotted).unwrap()
    }

    fn set(paths: &[&str]) -> Set {
        paths.iter().map(|s| p(s)).collect()
    }

    #[test]
    fn test_set_insert_and_has() {
        let mut s = Set::new();
        assert!(s.is_empty());

        s.insert(&p("data.key"));
        assert!(s.has(&p("data.key")));
        assert!(!s.has(&p("data")));
        assert!(!s.has(&Path::new()));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_set_remove_prunes_nodes() {
        let mut s = set(&["a.b.c", "x"]);
        assert!(s.remove(&p("a.b.c")));
        assert!(!s.remove(&p("a.b.c")));
        assert!(s.children.is_empty());
        assert_eq!(s.paths(), vec![p("x")]);
    }

    #[test]
    fn test_set_covers_and_descendants() {
        let s = set(&["a", "b.c.d"]);
        assert!(s.covers(&p("a")));
        assert!(s.covers(&p("a.x.y")));
        assert!(!s.covers(&p("b.c")));
        assert!(s.has_descendants_of(&p("b")));
        assert!(s.has_descendants_of(&p("b.c")));
        assert!(!s.has_descendants_of(&p("b.c.d")));
        assert!(!s.has_descendants_of(&p("a")));
        assert_eq!(s.descendants_of(&p("b")), vec![p("b.c.d")]);
    }

    #[test]
    fn test_set_algebra() {
        let s1 = set(&["a.x", "b"]);
        let s2 = set(&["a.y", "b"]);

        assert_eq!(s1.union(&s2), set(&["a.x", "a.y", "b"]));
        assert_eq!(s1.intersection(&s2), set(&["b"]));
        assert_eq!(s1.difference(&s2), set(&["a.x"]));
        assert!(s1.difference(&s1).is_empty());
    }

    #[test]
    fn test_set_iterate_in_order() {
        let s = set(&["b", "a.c", "a"]);
        let paths: Vec<String> = s.paths().iter().map(|p| p.to_string()).collect();
        assert_eq!(paths, vec!["a", "b", "a.c"]);
    }
}
