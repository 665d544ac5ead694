//! Typed decoding of raw event logs against declared schemas

pub mod decoder;
pub mod schema;

pub use decoder::{decode, DecodeError, DecodedBatch, DomainEvent, EventDecoder, SkippedEvent};
pub use schema::{EventKind, EventSchema, FieldKind, FieldSpec, CATALOG};
