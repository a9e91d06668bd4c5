//! The schema-registry contract.

use std::sync::Arc;

use apache_avro::Schema;
use async_trait::async_trait;

use keel_core::Result;

use crate::wire::SchemaId;

/// A schema registry.
///
/// Maps `SchemaId → parsed schema` for decoding and
/// `(subject, schema text) → SchemaId` for encoding. Implementations:
/// [`HttpRepository`](crate::HttpRepository) talks to a registry service,
/// [`CachedRepository`](crate::CachedRepository) and
/// [`LoggedRepository`](crate::LoggedRepository) decorate another
/// repository, and [`MemoryRepository`](crate::MemoryRepository) backs
/// tests and local development.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Resolves the parsed schema registered under `id`.
    async fn get_schema_by_id(&self, id: SchemaId) -> Result<Arc<Schema>>;

    /// Resolves the id registered for `schema_text` under `subject`.
    ///
    /// The exact text is sent to the registry — not a canonicalized form;
    /// some registries reject canonicalized variants of the registered
    /// text.
    async fn get_id_by_schema(
        &self,
        subject: &str,
        schema_text: &str,
    ) -> Result<(SchemaId, Arc<Schema>)>;
}

#[async_trait]
impl<R: Repository + ?Sized> Repository for Arc<R> {
    async fn get_schema_by_id(&self, id: SchemaId) -> Result<Arc<Schema>> {
        (**self).get_schema_by_id(id).await
    }

    async fn get_id_by_schema(
        &self,
        subject: &str,
        schema_text: &str,
    ) -> Result<(SchemaId, Arc<Schema>)> {
        (**self).get_id_by_schema(subject, schema_text).await
    }
}
