//! In-memory directory of registered services.

use crate::protocol::ServiceName;
use crate::{Result, SoaError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Where a registered service can be reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryEntry {
    pub host: String,
    pub port: u16,
    pub description: String,
    pub registered_at: DateTime<Utc>,
}

impl RegistryEntry {
    pub fn new(host: impl Into<String>, port: u16, description: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            description: description.into(),
            registered_at: Utc::now(),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Directory keyed by the five-character service field.
///
/// Entries live until explicitly removed; a service that dies without
/// unregistering stays listed. The lock is only held while the map is read
/// or mutated, never across network I/O.
#[derive(Debug, Clone, Default)]
pub struct ServiceDirectory {
    entries: Arc<Mutex<HashMap<ServiceName, RegistryEntry>>>,
}

impl ServiceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_entries(&self) -> Result<MutexGuard<'_, HashMap<ServiceName, RegistryEntry>>> {
        self.entries
            .lock()
            .map_err(|_| SoaError::Other("Failed to acquire service directory lock".to_string()))
    }

    /// Insert or overwrite. Returns the entry that was replaced, if any.
    pub fn register(&self, name: ServiceName, entry: RegistryEntry) -> Result<Option<RegistryEntry>> {
        Ok(self.lock_entries()?.insert(name, entry))
    }

    /// Remove an entry. Returns `None` when the name was not registered.
    pub fn unregister(&self, name: &ServiceName) -> Result<Option<RegistryEntry>> {
        Ok(self.lock_entries()?.remove(name))
    }

    /// Copy out the entry for `name`.
    pub fn lookup(&self, name: &ServiceName) -> Result<Option<RegistryEntry>> {
        Ok(self.lock_entries()?.get(name).cloned())
    }

    /// Snapshot of all entries, ordered by name.
    pub fn list(&self) -> Result<Vec<(ServiceName, RegistryEntry)>> {
        let mut entries: Vec<_> = self
            .lock_entries()?
            .iter()
            .map(|(name, entry)| (name.clone(), entry.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    pub fn len(&self) -> usize {
        self.lock_entries().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let dir = ServiceDirectory::new();
        dir.register(ServiceName::new("calc"), RegistryEntry::new("localhost", 8001, "math"))
            .unwrap();

        let entry = dir.lookup(&ServiceName::new("calc")).unwrap().unwrap();
        assert_eq!(entry.addr(), "localhost:8001");
        assert_eq!(entry.description, "math");
    }

    #[test]
    fn test_register_overwrites() {
        let dir = ServiceDirectory::new();
        let name = ServiceName::new("calc");

        let first = dir
            .register(name.clone(), RegistryEntry::new("localhost", 8001, ""))
            .unwrap();
        assert!(first.is_none());

        let replaced = dir
            .register(name.clone(), RegistryEntry::new("10.0.0.2", 9001, ""))
            .unwrap();
        assert_eq!(replaced.unwrap().port, 8001);

        assert_eq!(dir.len(), 1);
        assert_eq!(dir.lookup(&name).unwrap().unwrap().host, "10.0.0.2");
    }

    #[test]
    fn test_names_normalised_to_field_collide() {
        let dir = ServiceDirectory::new();
        dir.register(ServiceName::new("forums"), RegistryEntry::new("a", 1, ""))
            .unwrap();
        dir.register(ServiceName::new("forum_admin"), RegistryEntry::new("b", 2, ""))
            .unwrap();

        assert_eq!(dir.len(), 1);
        assert_eq!(dir.lookup(&ServiceName::new("forum")).unwrap().unwrap().host, "b");
    }

    #[test]
    fn test_unregister() {
        let dir = ServiceDirectory::new();
        let name = ServiceName::new("calc");
        dir.register(name.clone(), RegistryEntry::new("localhost", 8001, ""))
            .unwrap();

        assert!(dir.unregister(&name).unwrap().is_some());
        assert!(dir.unregister(&name).unwrap().is_none());
        assert!(dir.is_empty());
    }

    #[test]
    fn test_list_is_sorted() {
        let dir = ServiceDirectory::new();
        for name in ["post", "auth", "forum"] {
            dir.register(ServiceName::new(name), RegistryEntry::new("h", 1, ""))
                .unwrap();
        }
        let names: Vec<String> = dir
            .list()
            .unwrap()
            .into_iter()
            .map(|(name, _)| name.to_string())
            .collect();
        assert_eq!(names, vec!["auth", "forum", "post"]);
    }
}
