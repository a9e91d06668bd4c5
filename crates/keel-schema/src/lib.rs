//! # keel-schema
//!
//! Decoder/encoder for a binary record format carrying a 5-byte
//! magic + schema-id prefix (the "wire format"), backed by a schema
//! registry abstraction with pluggable caching.
//!
//! ## Layers
//!
//! - [`wire`]: the framing itself — `0x00 || be-u32 schema-id || payload`
//! - [`Repository`]: the registry contract (`GET /schemas/ids/<id>`,
//!   `POST /subjects/<subject>`), with an HTTP implementation
//!   ([`HttpRepository`]), a read-through cache ([`CachedRepository`]), a
//!   logging decorator ([`LoggedRepository`]), and an in-memory variant for
//!   tests and local development ([`MemoryRepository`])
//! - [`Decoder`] / [`Encoder`]: Avro (de)serialization of the payload
//!   against registry-resolved schemas
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use keel_schema::{CachedRepository, Decoder, HttpRepository};
//!
//! # async fn demo() -> keel_core::Result<()> {
//! let registry = Arc::new(CachedRepository::new(HttpRepository::new(
//!     "http://schema-registry:8081",
//! )));
//! let decoder = Decoder::new(registry);
//!
//! #[derive(serde::Deserialize)]
//! struct Event {
//!     id: String,
//! }
//! let event: Event = decoder.decode(&[0, 0, 0, 0, 7, /* payload */]).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod cache;
pub mod client;
pub mod decoder;
pub mod encoder;
pub mod logging;
pub mod memory;
pub mod repository;
pub mod wire;

pub use cache::CachedRepository;
pub use client::HttpRepository;
pub use decoder::{Decoder, DEFAULT_MAX_PAYLOAD_BYTES};
pub use encoder::Encoder;
pub use logging::LoggedRepository;
pub use memory::MemoryRepository;
pub use repository::Repository;
pub use wire::{decode_wire, encode_wire, SchemaId};
