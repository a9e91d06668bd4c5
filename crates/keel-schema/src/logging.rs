//! Logging decorator over a registry repository.

use std::sync::Arc;

use apache_avro::Schema;
use async_trait::async_trait;

use keel_core::Result;

use crate::repository::Repository;
use crate::wire::SchemaId;

/// Decorator logging each registry call with structured fields.
///
/// Successes log at debug, failures at error with the error attached.
/// Errors are never suppressed or transformed.
pub struct LoggedRepository<R> {
    inner: R,
}

impl<R> LoggedRepository<R> {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<R: Repository> Repository for LoggedRepository<R> {
    async fn get_schema_by_id(&self, id: SchemaId) -> Result<Arc<Schema>> {
        match self.inner.get_schema_by_id(id).await {
            Ok(schema) => {
                tracing::debug!(schema_id = id.value(), "resolved schema by id");
                Ok(schema)
            }
            Err(err) => {
                tracing::error!(schema_id = id.value(), error = %err, "schema lookup failed");
                Err(err)
            }
        }
    }

    async fn get_id_by_schema(
        &self,
        subject: &str,
        schema_text: &str,
    ) -> Result<(SchemaId, Arc<Schema>)> {
        match self.inner.get_id_by_schema(subject, schema_text).await {
            Ok((id, schema)) => {
                tracing::debug!(subject, schema_id = id.value(), "resolved id by schema");
                Ok((id, schema))
            }
            Err(err) => {
                tracing::error!(subject, error = %err, "subject lookup failed");
                Err(err)
            }
        }
    }
}
