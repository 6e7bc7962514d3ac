//! store::memory_store
//!
//! Option store kept in memory, for tests and dry runs.

use std::collections::BTreeMap;
use std::sync::Mutex;

use super::traits::{OptionStore, PersistedOptions, StoreError};
use crate::core::types::InstanceName;

#[derive(Debug, Default)]
pub struct MemoryOptionStore {
    records: Mutex<BTreeMap<InstanceName, PersistedOptions>>,
}

impl MemoryOptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the record of `instance`.
    pub fn with_options(self, instance: InstanceName, options: PersistedOptions) -> Self {
        if let Ok(mut records) = self.records.lock() {
            records.insert(instance, options);
        }
        self
    }

    fn records(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<InstanceName, PersistedOptions>>, StoreError>
    {
        self.records
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }
}

impl OptionStore for MemoryOptionStore {
    fn load(&self, instance: &InstanceName) -> Result<PersistedOptions, StoreError> {
        Ok(self.records()?.get(instance).cloned().unwrap_or_default())
    }

    fn save(&self, instance: &InstanceName, options: &PersistedOptions) -> Result<(), StoreError> {
        let mut records = self.records()?;
        let record = records.entry(instance.clone()).or_default();
        record.extend(options.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    fn remove(&self, instance: &InstanceName) -> Result<(), StoreError> {
        self.records()?.remove(instance);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PersistedValue;

    #[test]
    fn seeded_and_merged() {
        let git1 = InstanceName::new("git1").unwrap();
        let mut seed = PersistedOptions::new();
        seed.insert("token".into(), PersistedValue::secure("abc"));
        let store = MemoryOptionStore::new().with_options(git1.clone(), seed);

        let mut more = PersistedOptions::new();
        more.insert("server".into(), PersistedValue::new("github.com"));
        store.save(&git1, &more).unwrap();

        let loaded = store.load(&git1).unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded["token"].secure);
    }

    #[test]
    fn unknown_instance_is_empty() {
        let store = MemoryOptionStore::new();
        assert!(store
            .load(&InstanceName::new("ghost").unwrap())
            .unwrap()
            .is_empty());
    }
}
