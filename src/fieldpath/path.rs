//! Field path type.

use crate::value::ValidationError;
use std::fmt;

/// Path locates a field inside a document as a sequence of mapping keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    elements: Vec<String>,
}

impl Path {
    /// Creates a new empty path.
    pub fn new() -> Self {
        Path {
            elements: Vec::new(),
        }
    }

    /// Creates a path from a sequence of keys.
    pub fn from_elements<I, S>(elements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Path {
            elements: elements.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses a dotted path such as `data.key`.
    pub fn parse(dotted: &str) -> Result<Path, ValidationError> {
        if dotted.is_empty() {
            return Err(ValidationError::EmptyPath);
        }
        let path = Path::from_elements(dotted.split('.'));
        if path.iter().any(|key| key.is_empty()) {
            return Err(ValidationError::empty_field_name(dotted));
        }
        Ok(path)
    }

    /// Returns the number of keys in the path.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns true if the path is empty.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Returns an iterator over the keys.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.elements.iter()
    }

    /// Appends a key.
    pub fn push(&mut self, key: impl Into<String>) {
        self.elements.push(key.into());
    }

    /// Removes and returns the last key.
    pub fn pop(&mut self) -> Option<String> {
        self.elements.pop()
    }

    /// Returns the last key.
    pub fn last(&self) -> Option<&str> {
        self.elements.last().map(String::as_str)
    }

    /// Returns a slice of the keys.
    pub fn as_slice(&self) -> &[String] {
        &self.elements
    }

    /// Returns true if `self` is a strict prefix of `other`.
    pub fn is_ancestor_of(&self, other: &Path) -> bool {
        self.len() < other.len() && other.elements.starts_with(&self.elements)
    }

    /// Returns every non-empty strict prefix, shortest first.
    pub fn ancestors(&self) -> impl Iterator<Item = Path> + '_ {
        (1..self.len()).map(move |n| Path {
            elements: self.elements[..n].to_vec(),
        })
    }
}

impl FromIterator<String> for Path {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Path {
            elements: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Path {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.elements.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            if key.is_empty() || key.contains('.') {
                write!(f, "[{:?}]", key)?;
            } else {
                write!(f, "{}", key)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_operations() {
        let mut path = Path::new();
        assert!(path.is_empty());

        path.push("data");
        path.push("key");
        assert_eq!(path.len(), 2);
        assert_eq!(path.last(), Some("key"));

        let popped = path.pop();
        assert_eq!(popped, Some("key".to_string()));
        assert_eq!(path.len(), 1);
    }

    #[test]
    fn test_path_parse_and_display() {
        let path = Path::parse("data.key").unwrap();
        assert_eq!(path, Path::from_elements(["data", "key"]));
        assert_eq!(path.to_string(), "data.key");

        assert_eq!(Path::parse(""), Err(ValidationError::EmptyPath));
        assert!(Path::parse("data..key").is_err());

        let dotted = Path::from_elements(["metadata", "example.com/tier"]);
        assert_eq!(dotted.to_string(), "metadata.[\"example.com/tier\"]");
    }

    #[test]
    fn test_path_ancestry() {
        let a = Path::parse("a").unwrap();
        let abc = Path::parse("a.b.c").unwrap();
        assert!(a.is_ancestor_of(&abc));
        assert!(!abc.is_ancestor_of(&a));
        assert!(!a.is_ancestor_of(&a));

        let ancestors: Vec<String> = abc.ancestors().map(|p| p.to_string()).collect();
        assert_eq!(ancestors, vec!["a", "a.b"]);
        assert_eq!(a.ancestors().count(), 0);
    }

    #[test]
    fn test_path_ordering() {
        let a = Path::parse("a").unwrap();
        let ab = Path::parse("a.b").unwrap();
        let b = Path::parse("b").unwrap();
        assert!(a < ab);
        assert!(ab < b);
    }
}
