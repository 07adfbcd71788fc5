//! In-memory stats registry shared between the pipeline and readers.
//!
//! One `Arc<StatsTable>` per instrument. Publishing replaces the whole
//! table under the write lock; readers clone the `Arc` and keep using the
//! table they got, so a lookup sees either the old or the new table and
//! never a mix.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use statelab_core::aggregate::StatsTable;
use statelab_core::classify::ClassifiedState;
use statelab_core::expectation::{serve, ExpectationResponse};

use crate::store::{DatasetStore, StoreError};

#[derive(Debug, Default)]
pub struct StatsRegistry {
    tables: RwLock<HashMap<String, Arc<StatsTable>>>,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a freshly computed table. Returns the table it replaced.
    pub fn publish(&self, table: StatsTable) -> Option<Arc<StatsTable>> {
        let instrument = table.instrument.clone();
        self.tables.write().insert(instrument, Arc::new(table))
    }

    pub fn get(&self, instrument: &str) -> Option<Arc<StatsTable>> {
        self.tables.read().get(instrument).cloned()
    }

    pub fn remove(&self, instrument: &str) -> Option<Arc<StatsTable>> {
        self.tables.write().remove(instrument)
    }

    /// Registered instruments, sorted.
    pub fn instruments(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }

    /// Publish every stats table found in a store. Returns how many were
    /// loaded.
    pub fn load_from_store(&self, store: &DatasetStore) -> Result<usize, StoreError> {
        let mut loaded = 0;
        for instrument in store.stats_instruments()? {
            if let Some(table) = store.load_stats(&instrument)? {
                self.publish(table);
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    /// Live lookup against whatever table is current for the instrument.
    pub fn expect(&self, instrument: &str, classified: &ClassifiedState) -> ExpectationResponse {
        let table = self.get(instrument);
        serve(instrument, classified, table.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statelab_core::encode::{Granularity, KEY_SCHEME_VERSION};

    fn table(instrument: &str, min_samples: usize) -> StatsTable {
        StatsTable {
            instrument: instrument.to_string(),
            key_version: KEY_SCHEME_VERSION,
            granularity: Granularity::ThreePillar,
            min_samples,
            rows: Vec::new(),
        }
    }

    #[test]
    fn publish_replaces_whole_table() {
        let registry = StatsRegistry::new();
        assert!(registry.publish(table("GLD", 10)).is_none());

        let before = registry.get("GLD").unwrap();
        let replaced = registry.publish(table("GLD", 20)).unwrap();

        assert_eq!(replaced.min_samples, 10);
        // A reader holding the old Arc keeps a consistent view.
        assert_eq!(before.min_samples, 10);
        assert_eq!(registry.get("GLD").unwrap().min_samples, 20);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn instruments_are_sorted() {
        let registry = StatsRegistry::new();
        registry.publish(table("SLV", 10));
        registry.publish(table("GLD", 10));
        assert_eq!(registry.instruments(), vec!["GLD", "SLV"]);
        registry.remove("SLV");
        assert_eq!(registry.instruments(), vec!["GLD"]);
    }

    #[test]
    fn concurrent_readers_see_whole_tables() {
        let registry = Arc::new(StatsRegistry::new());
        registry.publish(table("GLD", 0));

        std::thread::scope(|s| {
            let writer = Arc::clone(&registry);
            s.spawn(move || {
                for n in 1..200 {
                    writer.publish(table("GLD", n));
                }
            });
            for _ in 0..4 {
                let reader = Arc::clone(&registry);
                s.spawn(move || {
                    let mut last = 0;
                    for _ in 0..200 {
                        let t = reader.get("GLD").unwrap();
                        assert!(t.min_samples >= last);
                        last = t.min_samples;
                    }
                });
            }
        });

        assert_eq!(registry.get("GLD").unwrap().min_samples, 199);
    }

    #[test]
    fn loads_tables_from_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatasetStore::new(dir.path());
        store.write_stats(&table("GLD", 10)).unwrap();
        store.write_stats(&table("SLV", 10)).unwrap();

        let registry = StatsRegistry::new();
        assert_eq!(registry.load_from_store(&store).unwrap(), 2);
        assert!(registry.get("SLV").is_some());
    }
}
