//! Wire-format record encoder.

use std::sync::Arc;

use apache_avro::{to_avro_datum, to_value, Schema};
use serde::Serialize;

use keel_core::{Code, Error, Result, Severity};

use crate::repository::Repository;
use crate::wire::{encode_wire, SchemaId};

/// Encoder bound to a single `(subject, writer schema)` pair.
///
/// The binding is resolved once at construction and immutable thereafter.
#[derive(Debug)]
pub struct Encoder {
    subject: String,
    schema: Arc<Schema>,
    schema_id: SchemaId,
}

impl Encoder {
    /// Parses `writer_schema_text` and resolves its id under `subject`.
    ///
    /// The raw text is sent to the registry, never a canonicalized form:
    /// canonicalization changes the bytes and some registries answer 404
    /// for canonicalized variants of the registered text.
    ///
    /// # Errors
    ///
    /// Returns an `Input` error when the text does not parse, or the
    /// registry's own error when id resolution fails.
    pub async fn new(
        repository: &dyn Repository,
        subject: impl Into<String>,
        writer_schema_text: &str,
    ) -> Result<Self> {
        let subject = subject.into();

        Schema::parse_str(writer_schema_text).map_err(|e| {
            Error::build()
                .op("codec.encoder")
                .code(Code::DECODE_ERROR)
                .severity(Severity::Input)
                .kv("subject", &subject)
                .msg("writer schema does not parse")
                .source(e)
                .finish()
                .unwrap_or_else(|| Error::decode("writer schema does not parse"))
        })?;

        let (schema_id, schema) = repository
            .get_id_by_schema(&subject, writer_schema_text)
            .await?;

        Ok(Self {
            subject,
            schema,
            schema_id,
        })
    }

    /// Returns the subject this encoder is bound to.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the resolved writer schema id.
    #[must_use]
    pub const fn schema_id(&self) -> SchemaId {
        self.schema_id
    }

    /// Binary-marshals `value` against the writer schema and frames it.
    ///
    /// # Errors
    ///
    /// Returns an `Input` error when the value does not fit the schema.
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        let avro_value = to_value(value).map_err(|e| {
            Error::build()
                .op("codec.encode")
                .code(Code::DECODE_ERROR)
                .severity(Severity::Input)
                .kv("subject", &self.subject)
                .msg("value is not representable in Avro")
                .source(e)
                .finish()
                .unwrap_or_else(|| Error::decode("value is not representable in Avro"))
        })?;

        let payload = to_avro_datum(&self.schema, avro_value).map_err(|e| {
            Error::build()
                .op("codec.encode")
                .code(Code::DECODE_ERROR)
                .severity(Severity::Input)
                .kv("subject", &self.subject)
                .kv("schemaId", self.schema_id)
                .msg("value does not match the writer schema")
                .source(e)
                .finish()
                .unwrap_or_else(|| Error::decode("value does not match the writer schema"))
        })?;

        Ok(encode_wire(self.schema_id, &payload))
    }
}
