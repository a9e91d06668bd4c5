//! Wire-format record decoder.

use std::sync::Arc;

use apache_avro::types::Value;
use apache_avro::{from_avro_datum, from_value};
use serde::de::DeserializeOwned;

use keel_core::{Code, Error, Result, Severity};

use crate::repository::Repository;
use crate::wire::{decode_wire, SchemaId};

/// Default bound on decoded payload size (10 MiB).
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Decoder resolving writer schemas through a registry repository.
pub struct Decoder {
    repository: Arc<dyn Repository>,
    max_payload_bytes: Option<usize>,
}

impl Decoder {
    /// Creates a decoder with the default payload bound.
    #[must_use]
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self {
            repository,
            max_payload_bytes: Some(DEFAULT_MAX_PAYLOAD_BYTES),
        }
    }

    /// Overrides the payload bound; `None` disables the check.
    #[must_use]
    pub fn with_max_payload_bytes(mut self, max: Option<usize>) -> Self {
        self.max_payload_bytes = max;
        self
    }

    /// Decodes a framed record into `T`.
    ///
    /// # Errors
    ///
    /// Framing and unmarshal failures carry severity `input`; registry
    /// failures propagate with their own severity.
    pub async fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        let (_, value) = self.decode_value(bytes).await?;
        from_value::<T>(&value).map_err(|e| {
            Error::build()
                .op("codec.decode")
                .code(Code::DECODE_ERROR)
                .severity(Severity::Input)
                .msg("record does not match the target type")
                .source(e)
                .finish()
                .unwrap_or_else(|| Error::decode("record does not match the target type"))
        })
    }

    /// Decodes a framed record into a raw Avro value plus its schema id.
    ///
    /// # Errors
    ///
    /// Same classification as [`Decoder::decode`].
    pub async fn decode_value(&self, bytes: &[u8]) -> Result<(SchemaId, Value)> {
        let (schema_id, payload) = decode_wire(bytes)?;

        if let Some(max) = self.max_payload_bytes {
            if payload.len() > max {
                return Err(Error::build()
                    .op("codec.decode")
                    .code(Code::RESPONSE_TOO_LONG)
                    .severity(Severity::Input)
                    .kv("payloadBytes", payload.len())
                    .kv("maxBytes", max)
                    .msg("payload exceeds the configured size bound")
                    .finish()
                    .unwrap_or_else(|| Error::decode("payload too long")));
            }
        }

        let schema = self.repository.get_schema_by_id(schema_id).await?;

        let mut reader = payload;
        let value = from_avro_datum(&schema, &mut reader, None).map_err(|e| {
            Error::build()
                .op("codec.decode")
                .code(Code::DECODE_ERROR)
                .severity(Severity::Input)
                .kv("schemaId", schema_id)
                .msg("payload does not match the writer schema")
                .source(e)
                .finish()
                .unwrap_or_else(|| Error::decode("payload does not match the writer schema"))
        })?;
        Ok((schema_id, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    use crate::memory::MemoryRepository;
    use crate::wire::encode_wire;

    const TAGS_SCHEMA: &str = r#"{"type":"record","name":"Tags","fields":[{"name":"Tags","type":{"type":"array","items":"string"}}]}"#;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Tags {
        #[serde(rename = "Tags")]
        tags: Vec<String>,
    }

    fn registry_with_tags() -> Arc<MemoryRepository> {
        let repo = Arc::new(MemoryRepository::new());
        let id = repo.register("tags-value", TAGS_SCHEMA).unwrap();
        assert_eq!(id, SchemaId(1));
        repo
    }

    #[tokio::test]
    async fn decodes_the_golden_vector() {
        // Avro array block with negative count: 3 items, 6 payload bytes.
        let bytes = [
            0u8, 0, 0, 0, 1, 5, 12, 2, 0x61, 2, 0x62, 2, 0x63, 0,
        ];
        let decoder = Decoder::new(registry_with_tags());
        let decoded: Tags = decoder.decode(&bytes).await.unwrap();
        assert_eq!(
            decoded,
            Tags {
                tags: vec!["a".to_string(), "b".to_string(), "c".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn unknown_schema_id_propagates_registry_error() {
        let decoder = Decoder::new(registry_with_tags());
        let bytes = encode_wire(SchemaId(99), &[2, 0]);
        let err = decoder.decode::<Tags>(&bytes).await.unwrap_err();
        assert_eq!(err.severity(), Severity::Input);
        assert!(err.to_string().contains("subject or schema not found"));
    }

    #[tokio::test]
    async fn corrupt_payload_is_an_input_decode_error() {
        let decoder = Decoder::new(registry_with_tags());
        // Claims one block of a huge byte size that is not present.
        let bytes = encode_wire(SchemaId(1), &[1, 127, 127]);
        let err = decoder.decode::<Tags>(&bytes).await.unwrap_err();
        assert_eq!(err.code(), &Code::DECODE_ERROR);
        assert_eq!(err.severity(), Severity::Input);
    }

    #[tokio::test]
    async fn oversized_payload_is_rejected() {
        let decoder = Decoder::new(registry_with_tags()).with_max_payload_bytes(Some(4));
        let bytes = encode_wire(SchemaId(1), &[6, 2, 0x61, 2, 0x62, 2, 0x63, 0]);
        let err = decoder.decode::<Tags>(&bytes).await.unwrap_err();
        assert_eq!(err.code(), &Code::RESPONSE_TOO_LONG);
        assert_eq!(err.severity(), Severity::Input);
    }

    #[tokio::test]
    async fn disabled_bound_accepts_large_payloads() {
        let decoder = Decoder::new(registry_with_tags()).with_max_payload_bytes(None);
        let bytes = encode_wire(SchemaId(1), &[6, 2, 0x61, 2, 0x62, 2, 0x63, 0]);
        let decoded: Tags = decoder.decode(&bytes).await.unwrap();
        assert_eq!(decoded.tags.len(), 3);
    }

    #[tokio::test]
    async fn short_input_is_rejected_before_the_registry_is_consulted() {
        let decoder = Decoder::new(Arc::new(MemoryRepository::new()));
        let err = decoder.decode::<Tags>(&[0, 0]).await.unwrap_err();
        assert_eq!(err.code(), &Code::DECODE_ERROR);
    }
}
