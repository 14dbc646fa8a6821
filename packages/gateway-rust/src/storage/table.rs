//! Keyed in-memory table backed by [`DashMap`].
//!
//! Shared by the in-memory backends. `insert_new` performs the existence
//! check and the insert under one shard lock, which is what gives the
//! backends their atomic create.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Why a table write was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TableError {
    Exists,
    Missing,
}

pub(crate) struct Table<T> {
    rows: DashMap<String, T>,
}

impl<T: Clone> Table<T> {
    pub(crate) fn new() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }

    /// Inserts `value` unless `key` is already present.
    pub(crate) fn insert_new(&self, key: &str, value: T) -> Result<T, TableError> {
        match self.rows.entry(key.to_string()) {
            Entry::Occupied(_) => Err(TableError::Exists),
            Entry::Vacant(slot) => {
                slot.insert(value.clone());
                Ok(value)
            }
        }
    }

    /// Overwrites the row at `key`, which must exist.
    pub(crate) fn replace(&self, key: &str, value: T) -> Result<T, TableError> {
        let mut row = self.rows.get_mut(key).ok_or(TableError::Missing)?;
        *row = value.clone();
        Ok(value)
    }

    pub(crate) fn get(&self, key: &str) -> Option<T> {
        self.rows.get(key).map(|r| r.value().clone())
    }

    pub(crate) fn remove(&self, key: &str) -> Option<T> {
        self.rows.remove(key).map(|(_, v)| v)
    }

    /// All rows ordered by key.
    pub(crate) fn list(&self) -> Vec<T> {
        let mut rows: Vec<(String, T)> = self
            .rows
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows.into_iter().map(|(_, v)| v).collect()
    }

    /// Any row satisfying `pred`.
    pub(crate) fn any(&self, pred: impl Fn(&T) -> bool) -> bool {
        self.rows.iter().any(|r| pred(r.value()))
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn insert_new_refuses_existing_key() {
        let table = Table::new();
        assert_eq!(table.insert_new("a", 1), Ok(1));
        assert_eq!(table.insert_new("a", 2), Err(TableError::Exists));
        assert_eq!(table.get("a"), Some(1));
    }

    #[test]
    fn replace_requires_existing_key() {
        let table = Table::new();
        assert_eq!(table.replace("a", 1), Err(TableError::Missing));
        table.insert_new("a", 1).unwrap();
        assert_eq!(table.replace("a", 5), Ok(5));
        assert_eq!(table.get("a"), Some(5));
    }

    #[test]
    fn list_is_key_ordered() {
        let table = Table::new();
        for key in ["c", "a", "b"] {
            table.insert_new(key, key.to_string()).unwrap();
        }
        assert_eq!(table.list(), vec!["a", "b", "c"]);
        assert_eq!(table.remove("b"), Some("b".to_string()));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn concurrent_insert_new_has_one_winner() {
        let table = Arc::new(Table::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || table.insert_new("same", i).is_ok())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
