//! Per-document metadata entry

use std::collections::HashMap;

/// Attributes and last-access time for one document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    /// Last access, milliseconds since the Unix epoch
    atime: i64,
    values: HashMap<String, String>,
}

impl Entry {
    /// Create an empty entry last accessed at `atime`
    #[must_use]
    pub fn new(atime: i64) -> Self {
        Self {
            atime,
            values: HashMap::new(),
        }
    }

    /// Create an entry from decoded attributes
    #[must_use]
    pub const fn with_values(atime: i64, values: HashMap<String, String>) -> Self {
        Self { atime, values }
    }

    #[must_use]
    pub const fn atime(&self) -> i64 {
        self.atime
    }

    /// Mark the entry as accessed at `now`
    pub fn touch(&mut self, now: i64) {
        self.atime = now;
    }

    /// Look up an attribute value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Set an attribute, or remove it when `value` is `None` or empty
    ///
    /// Returns the previous value.
    pub fn set(&mut self, key: &str, value: Option<&str>) -> Option<String> {
        match value {
            Some(value) if !value.is_empty() => {
                self.values.insert(key.to_string(), value.to_string())
            }
            _ => self.values.remove(key),
        }
    }

    /// Attributes sorted by key
    #[must_use]
    pub fn sorted_values(&self) -> Vec<(&str, &str)> {
        let mut values: Vec<_> = self
            .values
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        values.sort_unstable();
        values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut entry = Entry::new(10);
        assert_eq!(entry.set("position", Some("42")), None);
        assert_eq!(entry.set("position", Some("43")), Some("42".to_string()));
        assert_eq!(entry.get("position"), Some("43"));
        assert_eq!(entry.get("encoding"), None);
    }

    #[test]
    fn test_set_none_removes() {
        let mut entry = Entry::new(10);
        entry.set("encoding", Some("UTF-8"));
        assert_eq!(entry.set("encoding", None), Some("UTF-8".to_string()));
        assert!(entry.is_empty());
        assert_eq!(entry.get("encoding"), None);

        // Removing an absent key is a no-op
        assert_eq!(entry.set("encoding", None), None);
    }

    #[test]
    fn test_set_empty_removes() {
        let mut entry = Entry::new(10);
        entry.set("language", Some("c"));
        assert_eq!(entry.set("language", Some("")), Some("c".to_string()));
        assert!(entry.is_empty());
    }

    #[test]
    fn test_touch() {
        let mut entry = Entry::new(10);
        entry.touch(5);
        assert_eq!(entry.atime(), 5);
    }

    #[test]
    fn test_sorted_values() {
        let mut entry = Entry::new(0);
        entry.set("position", Some("1"));
        entry.set("encoding", Some("UTF-8"));
        entry.set("language", Some("rust"));
        assert_eq!(
            entry.sorted_values(),
            vec![("encoding", "UTF-8"), ("language", "rust"), ("position", "1")]
        );
        assert_eq!(entry.len(), 3);
    }
}
