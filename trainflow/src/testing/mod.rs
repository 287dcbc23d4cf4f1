//! Test support: in-memory connectors and seeded insurance fixtures.
//!
//! Public so integration tests and benchmarks can drive a full run without
//! MongoDB or S3.

mod fakes;
pub mod fixtures;

pub use fakes::{InMemoryConnectors, InMemoryDocumentStore, InMemoryObjectStorage};
