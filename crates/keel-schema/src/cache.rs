//! Read-through cache over a registry repository.
//!
//! Schema IDs are presumed immutable in the upstream registry, so entries
//! never expire. A single reader/writer lock guards both directions of the
//! mapping; both are stored in one critical section on a miss.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use apache_avro::Schema;
use async_trait::async_trait;
use metrics::counter;

use keel_core::{Error, Result};

use crate::repository::Repository;
use crate::wire::SchemaId;

/// Cache hit counter.
pub const CACHE_HITS: &str = "schema_registry_cache_hits_total";

/// Cache miss counter.
pub const CACHE_MISSES: &str = "schema_registry_cache_misses_total";

#[derive(Default)]
struct Maps {
    by_id: HashMap<SchemaId, Arc<Schema>>,
    by_text: HashMap<String, SchemaId>,
}

/// Caching decorator for a [`Repository`].
pub struct CachedRepository<R> {
    inner: R,
    maps: RwLock<Maps>,
}

impl<R> CachedRepository<R> {
    /// Wraps `inner` with an empty cache.
    #[must_use]
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            maps: RwLock::new(Maps::default()),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Maps>> {
        self.maps
            .read()
            .map_err(|_| Error::internal("schema cache lock poisoned"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Maps>> {
        self.maps
            .write()
            .map_err(|_| Error::internal("schema cache lock poisoned"))
    }
}

#[async_trait]
impl<R: Repository> Repository for CachedRepository<R> {
    async fn get_schema_by_id(&self, id: SchemaId) -> Result<Arc<Schema>> {
        if let Some(schema) = self.read()?.by_id.get(&id) {
            counter!(CACHE_HITS).increment(1);
            return Ok(Arc::clone(schema));
        }
        counter!(CACHE_MISSES).increment(1);

        let schema = self.inner.get_schema_by_id(id).await?;
        self.write()?.by_id.insert(id, Arc::clone(&schema));
        Ok(schema)
    }

    async fn get_id_by_schema(
        &self,
        subject: &str,
        schema_text: &str,
    ) -> Result<(SchemaId, Arc<Schema>)> {
        {
            let maps = self.read()?;
            if let Some(&id) = maps.by_text.get(schema_text) {
                if let Some(schema) = maps.by_id.get(&id) {
                    counter!(CACHE_HITS).increment(1);
                    return Ok((id, Arc::clone(schema)));
                }
            }
        }
        counter!(CACHE_MISSES).increment(1);

        let (id, schema) = self.inner.get_id_by_schema(subject, schema_text).await?;
        let mut maps = self.write()?;
        maps.by_id.insert(id, Arc::clone(&schema));
        maps.by_text.insert(schema_text.to_string(), id);
        Ok((id, schema))
    }
}
