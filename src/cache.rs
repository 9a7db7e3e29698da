// 📇 Reference Cache - in-memory citizens and nurses for name matching
//
// Loaded once from the store (ordered by name), appended when the resolver
// creates a record, and merged when a citizen update comes back. Single
// writer: the session that owns it.

use crate::error::{ClinicError, Result};
use crate::models::{Citizen, Nurse};
use crate::store::{from_row, Query, RecordStore, Row, Table};

#[derive(Debug, Clone, Default)]
pub struct ReferenceCache {
    citizens: Vec<Citizen>,
    nurses: Vec<Nurse>,
}

impl ReferenceCache {
    pub fn new(citizens: Vec<Citizen>, nurses: Vec<Nurse>) -> Self {
        ReferenceCache { citizens, nurses }
    }

    /// Fetch both reference lists from the store
    pub fn load<S: RecordStore + ?Sized>(store: &S) -> Result<Self> {
        let citizens = fetch_ordered(store, Table::Citizens)?;
        let nurses = fetch_ordered(store, Table::Nurses)?;

        tracing::debug!(
            citizens = citizens.len(),
            nurses = nurses.len(),
            "loaded reference cache"
        );

        Ok(ReferenceCache { citizens, nurses })
    }

    pub fn citizens(&self) -> &[Citizen] {
        &self.citizens
    }

    pub fn nurses(&self) -> &[Nurse] {
        &self.nurses
    }

    /// Mutable list handed to the resolver so it can append what it creates
    pub fn citizens_mut(&mut self) -> &mut Vec<Citizen> {
        &mut self.citizens
    }

    pub fn nurses_mut(&mut self) -> &mut Vec<Nurse> {
        &mut self.nurses
    }

    pub fn citizen(&self, id: i64) -> Option<&Citizen> {
        self.citizens.iter().find(|c| c.id == id)
    }

    pub fn nurse(&self, id: i64) -> Option<&Nurse> {
        self.nurses.iter().find(|n| n.id == id)
    }

    /// Citizen whose name is exactly `name` (trimmed), for form auto-fill
    pub fn citizen_named(&self, name: &str) -> Option<&Citizen> {
        let name = name.trim();
        self.citizens.iter().find(|c| c.name.trim() == name)
    }

    /// Replace the cached copy of a citizen with what the store returned.
    /// Unknown citizens are appended.
    pub fn merge_citizen(&mut self, updated: Citizen) {
        match self.citizens.iter_mut().find(|c| c.id == updated.id) {
            Some(existing) => *existing = updated,
            None => self.citizens.push(updated),
        }
    }
}

fn fetch_ordered<S, T>(store: &S, table: Table) -> Result<Vec<T>>
where
    S: RecordStore + ?Sized,
    T: serde::de::DeserializeOwned,
{
    let selection = store.select(&Query::from(table).order("name", true))?;
    decode_rows(table, selection.rows)
}

/// Decode store rows into models, tagging failures with the table
pub fn decode_rows<T: serde::de::DeserializeOwned>(table: Table, rows: Vec<Row>) -> Result<Vec<T>> {
    rows.into_iter()
        .map(|row| from_row(row).map_err(|source| ClinicError::Decode { table, source }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use serde_json::json;

    fn citizen(id: i64, name: &str, age: u32) -> Citizen {
        Citizen {
            id,
            name: name.to_string(),
            age,
            address: "Rizal St".to_string(),
        }
    }

    #[test]
    fn test_load_orders_by_name() {
        let store = SqliteStore::open_in_memory().unwrap();
        let rows = ["Zeny", "Ana", "Mila"]
            .iter()
            .map(|name| {
                json!({"name": name, "age": 20, "address": "X"})
                    .as_object()
                    .cloned()
                    .unwrap()
            })
            .collect();
        store.insert(Table::Citizens, rows).unwrap();

        let cache = ReferenceCache::load(&store).unwrap();
        let names: Vec<&str> = cache.citizens().iter().map(|c| c.name.as_str()).collect();

        assert_eq!(names, vec!["Ana", "Mila", "Zeny"]);
        assert!(cache.nurses().is_empty());
    }

    #[test]
    fn test_merge_replaces_or_appends() {
        let mut cache = ReferenceCache::new(vec![citizen(1, "Ana", 30)], Vec::new());

        cache.merge_citizen(citizen(1, "Ana", 31));
        cache.merge_citizen(citizen(2, "Ben", 40));

        assert_eq!(cache.citizens().len(), 2);
        assert_eq!(cache.citizen(1).unwrap().age, 31);
        assert_eq!(cache.citizen(2).unwrap().name, "Ben");
    }

    #[test]
    fn test_citizen_named_is_exact() {
        let cache = ReferenceCache::new(vec![citizen(5, "Ana Reyes", 30)], Vec::new());

        assert_eq!(cache.citizen_named(" Ana Reyes ").map(|c| c.id), Some(5));
        assert!(cache.citizen_named("ana reyes").is_none());
    }
}
