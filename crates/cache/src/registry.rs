//! Registry of open namespaces.

use crate::error::{CacheError, CacheResult};
use crate::keys::validate_namespace_name;
use crate::namespace::Namespace;
use brokernode_core::config::CacheConfig;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Tracks every open namespace by name so repeated access reuses one handle.
///
/// Namespaces are opened lazily on first access. Closing a namespace removes
/// its on-disk state and is refused while any caller still holds its handle.
pub struct CacheRegistry {
    config: Arc<CacheConfig>,
    namespaces: DashMap<String, Arc<Namespace>>,
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("root", &self.config.root())
            .field("open", &self.namespaces.len())
            .finish()
    }
}

impl CacheRegistry {
    /// Create a registry rooted at the configured directory for its mode.
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        config.validate().map_err(CacheError::Config)?;
        std::fs::create_dir_all(config.root())?;
        info!(root = %config.root().display(), mode = ?config.mode, "Chunk cache initialized");
        Ok(Self {
            config: Arc::new(config),
            namespaces: DashMap::new(),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        self.config.root()
    }

    /// Get the namespace called `name`, opening it if necessary.
    ///
    /// Concurrent first accesses to one name are serialized; the first caller
    /// opens the database and the others receive the same handle.
    pub fn namespace(&self, name: &str) -> CacheResult<Arc<Namespace>> {
        if let Some(ns) = self.namespaces.get(name) {
            return Ok(Arc::clone(ns.value()));
        }

        validate_namespace_name(name)?;
        match self.namespaces.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let ns = Arc::new(Namespace::open(
                    name,
                    self.config.root(),
                    Arc::clone(&self.config),
                )?);
                entry.insert(Arc::clone(&ns));
                Ok(ns)
            }
        }
    }

    /// Names of all currently open namespaces, sorted.
    pub fn open_namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.namespaces.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn is_open(&self, name: &str) -> bool {
        self.namespaces.contains_key(name)
    }

    /// Close `name` and remove its on-disk state.
    ///
    /// Returns `NamespaceBusy` if another handle to the namespace is still
    /// alive. On-disk state of a namespace that is not open is removed too.
    #[instrument(skip(self))]
    pub fn close_namespace(&self, name: &str) -> CacheResult<()> {
        validate_namespace_name(name)?;

        let removed = self
            .namespaces
            .remove_if(name, |_, ns| Arc::strong_count(ns) == 1);

        let path = match removed {
            Some((_, ns)) => {
                let path = ns.path().to_path_buf();
                drop(ns);
                path
            }
            None if self.namespaces.contains_key(name) => {
                warn!(namespace = %name, "Refusing to close namespace with live handles");
                return Err(CacheError::NamespaceBusy(name.to_string()));
            }
            None => self.config.root().join(name),
        };

        match std::fs::remove_dir_all(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        debug!(namespace = %name, "Closed cache namespace");
        Ok(())
    }

    /// Close every open namespace.
    ///
    /// Idle namespaces are closed even when others are busy; the busy names
    /// are reported together afterwards.
    pub fn close_all(&self) -> CacheResult<usize> {
        let mut closed = 0;
        let mut busy = Vec::new();

        for name in self.open_namespaces() {
            match self.close_namespace(&name) {
                Ok(()) => closed += 1,
                Err(CacheError::NamespaceBusy(name)) => busy.push(name),
                Err(e) => return Err(e),
            }
        }

        if !busy.is_empty() {
            return Err(CacheError::NamespaceBusy(busy.join(", ")));
        }
        info!(closed, "Closed all cache namespaces");
        Ok(closed)
    }

    /// Purge expired entries from every open namespace.
    pub fn purge_expired(&self) -> CacheResult<usize> {
        let handles: Vec<Arc<Namespace>> = self
            .namespaces
            .iter()
            .map(|e| Arc::clone(e.value()))
            .collect();

        let mut purged = 0;
        for ns in handles {
            purged += ns.purge_expired()?;
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry() -> (TempDir, CacheRegistry) {
        let dir = TempDir::new().unwrap();
        let registry = CacheRegistry::new(CacheConfig::for_testing(dir.path())).unwrap();
        (dir, registry)
    }

    #[test]
    fn test_namespace_is_reused() {
        let (_dir, registry) = registry();
        let a = registry.namespace("p.ab.hash").unwrap();
        let b = registry.namespace("p.ab.hash").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.open_namespaces(), vec!["p.ab.hash"]);
    }

    #[test]
    fn test_close_removes_directory() {
        let (dir, registry) = registry();
        let ns = registry.namespace("p.ab.hash").unwrap();
        ns.batch_set([("ab_0", "v")], None).unwrap();
        let path = ns.path().to_path_buf();
        drop(ns);

        assert!(path.exists());
        registry.close_namespace("p.ab.hash").unwrap();
        assert!(!path.exists());
        assert!(!registry.is_open("p.ab.hash"));
        assert!(dir.path().exists());
    }

    #[test]
    fn test_close_refuses_busy_namespace() {
        let (_dir, registry) = registry();
        let ns = registry.namespace("p.ab.hash").unwrap();

        assert!(matches!(
            registry.close_namespace("p.ab.hash"),
            Err(CacheError::NamespaceBusy(_))
        ));
        assert!(registry.is_open("p.ab.hash"));

        drop(ns);
        registry.close_namespace("p.ab.hash").unwrap();
    }

    #[test]
    fn test_close_unknown_namespace_is_ok() {
        let (_dir, registry) = registry();
        registry.close_namespace("p.cd.message").unwrap();
    }

    #[test]
    fn test_invalid_namespace_name() {
        let (_dir, registry) = registry();
        assert!(matches!(
            registry.namespace("../escape"),
            Err(CacheError::InvalidKey(_))
        ));
    }
}
