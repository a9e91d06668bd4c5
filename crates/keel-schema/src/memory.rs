//! In-memory registry repository.
//!
//! Thread-safe via `RwLock`. Not suitable for production; intended for
//! tests and local development.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use apache_avro::Schema;
use async_trait::async_trait;

use keel_core::{Code, Error, Result, Severity};

use crate::repository::Repository;
use crate::wire::SchemaId;

#[derive(Default)]
struct State {
    next_id: u32,
    by_id: HashMap<SchemaId, Arc<Schema>>,
    by_subject_text: HashMap<(String, String), SchemaId>,
}

/// In-memory implementation of the registry [`Repository`].
#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<State>,
}

impl MemoryRepository {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `schema_text` under `subject`, assigning the next
    /// sequential id (starting at 1). Registering the same text twice under
    /// the same subject returns the existing id.
    ///
    /// # Errors
    ///
    /// Returns an `Input` error when the schema text does not parse.
    pub fn register(&self, subject: &str, schema_text: &str) -> Result<SchemaId> {
        let schema = Schema::parse_str(schema_text).map_err(|e| {
            Error::build()
                .op("memoryregistry.register")
                .code(Code::DECODE_ERROR)
                .severity(Severity::Input)
                .source(e)
                .finish()
                .unwrap_or_else(|| Error::decode("unparsable schema"))
        })?;

        let mut state = self
            .state
            .write()
            .map_err(|_| Error::internal("memory registry lock poisoned"))?;
        let key = (subject.to_string(), schema_text.to_string());
        if let Some(&id) = state.by_subject_text.get(&key) {
            return Ok(id);
        }
        state.next_id += 1;
        let id = SchemaId(state.next_id);
        state.by_id.insert(id, Arc::new(schema));
        state.by_subject_text.insert(key, id);
        Ok(id)
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_schema_by_id(&self, id: SchemaId) -> Result<Arc<Schema>> {
        let state = self
            .state
            .read()
            .map_err(|_| Error::internal("memory registry lock poisoned"))?;
        state.by_id.get(&id).map(Arc::clone).ok_or_else(|| {
            Error::build()
                .op("memoryregistry.get_schema_by_id")
                .severity(Severity::Input)
                .kv("schemaId", id)
                .msg("subject or schema not found")
                .finish()
                .unwrap_or_else(|| Error::invalid_input("subject or schema not found"))
        })
    }

    async fn get_id_by_schema(
        &self,
        subject: &str,
        schema_text: &str,
    ) -> Result<(SchemaId, Arc<Schema>)> {
        let state = self
            .state
            .read()
            .map_err(|_| Error::internal("memory registry lock poisoned"))?;
        let key = (subject.to_string(), schema_text.to_string());
        let id = state.by_subject_text.get(&key).copied().ok_or_else(|| {
            Error::build()
                .op("memoryregistry.get_id_by_schema")
                .severity(Severity::Input)
                .kv("subject", subject)
                .msg("subject or schema not found")
                .finish()
                .unwrap_or_else(|| Error::invalid_input("subject or schema not found"))
        })?;
        let schema = state
            .by_id
            .get(&id)
            .map(Arc::clone)
            .ok_or_else(|| Error::internal("registry id map out of sync"))?;
        Ok((id, schema))
    }
}
