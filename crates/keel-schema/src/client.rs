//! HTTP client for a schema-registry service.

use std::sync::Arc;
use std::time::Duration;

use apache_avro::Schema;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use keel_core::{Code, Error, Result, Severity};

use crate::repository::Repository;
use crate::wire::SchemaId;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Content type the registry expects on subject lookups.
pub const SCHEMA_REGISTRY_CONTENT_TYPE: &str = "application/vnd.schemaregistry+json";

/// HTTP implementation of the registry [`Repository`].
#[derive(Clone)]
pub struct HttpRepository {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SchemaResponse {
    schema: String,
}

#[derive(Debug, Deserialize)]
struct SubjectResponse {
    id: u32,
}

impl HttpRepository {
    /// Creates a new client targeting the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    /// Creates a client with a caller-provided `reqwest` client.
    #[must_use]
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    fn schema_by_id_url(&self, id: SchemaId) -> String {
        format!("{}/schemas/ids/{id}", self.base_url.trim_end_matches('/'))
    }

    fn subject_url(&self, subject: &str) -> String {
        format!("{}/subjects/{subject}", self.base_url.trim_end_matches('/'))
    }

    fn parse_schema(op: &'static str, text: &str) -> Result<Arc<Schema>> {
        let schema = Schema::parse_str(text).map_err(|e| {
            Error::build()
                .op(op)
                .code(Code::DECODE_ERROR)
                .severity(Severity::Input)
                .msg("registry returned an unparsable schema")
                .source(e)
                .finish()
                .unwrap_or_else(|| Error::decode("registry returned an unparsable schema"))
        })?;
        Ok(Arc::new(schema))
    }
}

#[async_trait]
impl Repository for HttpRepository {
    async fn get_schema_by_id(&self, id: SchemaId) -> Result<Arc<Schema>> {
        const OP: &str = "schemaregistry.get_schema_by_id";

        let response = self
            .client
            .get(self.schema_by_id_url(id))
            .send()
            .await
            .map_err(|e| {
                Error::build()
                    .op(OP)
                    .severity(Severity::Runtime)
                    .kv("schemaId", id)
                    .source(e)
                    .finish()
                    .unwrap_or_else(|| Error::new("schema registry request failed"))
            })?;

        let status = response.status();
        if status.is_success() {
            let body: SchemaResponse = response.json().await.map_err(|e| {
                Error::build()
                    .op(OP)
                    .code(Code::DECODE_ERROR)
                    .severity(Severity::Runtime)
                    .kv("schemaId", id)
                    .source(e)
                    .finish()
                    .unwrap_or_else(|| Error::new("invalid schema registry response"))
            })?;
            return Self::parse_schema(OP, &body.schema);
        }

        Err(classify_status(OP, status)
            .kv("schemaId", id)
            .finish()
            .unwrap_or_else(|| Error::new("schema registry lookup failed")))
    }

    async fn get_id_by_schema(
        &self,
        subject: &str,
        schema_text: &str,
    ) -> Result<(SchemaId, Arc<Schema>)> {
        const OP: &str = "schemaregistry.get_id_by_schema";

        // The raw text goes on the wire; canonicalizing here would make
        // some registries answer 404 for schemas they do hold.
        let body = serde_json::json!({ "schema": schema_text });

        let response = self
            .client
            .post(self.subject_url(subject))
            .header(reqwest::header::CONTENT_TYPE, SCHEMA_REGISTRY_CONTENT_TYPE)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                Error::build()
                    .op(OP)
                    .severity(Severity::Runtime)
                    .kv("subject", subject)
                    .source(e)
                    .finish()
                    .unwrap_or_else(|| Error::new("schema registry request failed"))
            })?;

        let status = response.status();
        if status.is_success() {
            let parsed: SubjectResponse = response.json().await.map_err(|e| {
                Error::build()
                    .op(OP)
                    .code(Code::DECODE_ERROR)
                    .severity(Severity::Runtime)
                    .kv("subject", subject)
                    .source(e)
                    .finish()
                    .unwrap_or_else(|| Error::new("invalid schema registry response"))
            })?;
            let schema = Self::parse_schema(OP, schema_text)?;
            return Ok((SchemaId(parsed.id), schema));
        }

        Err(classify_status(OP, status)
            .kv("subject", subject)
            .finish()
            .unwrap_or_else(|| Error::new("schema registry lookup failed")))
    }
}

/// Maps a non-success registry status to an error builder.
fn classify_status(op: &'static str, status: StatusCode) -> keel_core::ErrorBuilder {
    match status {
        StatusCode::NOT_FOUND => Error::build()
            .op(op)
            .severity(Severity::Input)
            .msg("subject or schema not found"),
        StatusCode::INTERNAL_SERVER_ERROR => Error::build()
            .op(op)
            .severity(Severity::Runtime)
            .msg("internal server error"),
        other => Error::build()
            .op(op)
            .severity(Severity::Runtime)
            .kv("statusCode", other.as_u16())
            .msg("unexpected schema registry status"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;

    const TAGS_SCHEMA: &str = r#"{"type":"record","name":"Tags","fields":[{"name":"Tags","type":{"type":"array","items":"string"}}]}"#;

    async fn spawn_registry(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn get_schema_by_id_parses_the_returned_schema() {
        let app = Router::new().route(
            "/schemas/ids/:id",
            get(|| async { Json(json!({ "schema": TAGS_SCHEMA })) }),
        );
        let client = HttpRepository::new(spawn_registry(app).await);

        let schema = client.get_schema_by_id(SchemaId(1)).await.unwrap();
        assert!(matches!(schema.as_ref(), Schema::Record(_)));
    }

    #[tokio::test]
    async fn get_id_by_schema_resolves_the_id() {
        let app = Router::new().route(
            "/subjects/:subject",
            post(|| async { Json(json!({ "id": 42, "schema": TAGS_SCHEMA })) }),
        );
        let client = HttpRepository::new(spawn_registry(app).await);

        let (id, schema) = client
            .get_id_by_schema("payments", TAGS_SCHEMA)
            .await
            .unwrap();
        assert_eq!(id, SchemaId(42));
        assert!(matches!(schema.as_ref(), Schema::Record(_)));
    }

    #[tokio::test]
    async fn not_found_maps_to_input_severity() {
        let app = Router::new().route(
            "/subjects/:subject",
            post(|| async { (StatusCode::NOT_FOUND, "") }),
        );
        let client = HttpRepository::new(spawn_registry(app).await);

        let err = client
            .get_id_by_schema("unknown", TAGS_SCHEMA)
            .await
            .unwrap_err();
        assert_eq!(err.severity(), Severity::Input);
        assert!(err.root_cause().contains("subject or schema not found"));
    }

    #[tokio::test]
    async fn internal_error_maps_to_runtime_severity() {
        let app = Router::new().route(
            "/subjects/:subject",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "") }),
        );
        let client = HttpRepository::new(spawn_registry(app).await);

        let err = client
            .get_id_by_schema("payments", TAGS_SCHEMA)
            .await
            .unwrap_err();
        assert_eq!(err.severity(), Severity::Runtime);
        assert!(err.root_cause().contains("internal server error"));
    }

    #[tokio::test]
    async fn other_statuses_attach_the_status_code() {
        let app = Router::new().route(
            "/subjects/:subject",
            post(|| async { (StatusCode::CONFLICT, "") }),
        );
        let client = HttpRepository::new(spawn_registry(app).await);

        let err = client
            .get_id_by_schema("payments", TAGS_SCHEMA)
            .await
            .unwrap_err();
        assert_eq!(err.severity(), Severity::Runtime);
        assert!(err.to_string().contains("statusCode=409"));
    }

    #[tokio::test]
    async fn unparsable_registry_schema_is_a_decode_error() {
        let app = Router::new().route(
            "/schemas/ids/:id",
            get(|| async { Json(json!({ "schema": "not-a-schema" })) }),
        );
        let client = HttpRepository::new(spawn_registry(app).await);

        let err = client.get_schema_by_id(SchemaId(7)).await.unwrap_err();
        assert_eq!(err.code(), &Code::DECODE_ERROR);
    }
}
