//! Data models for the import pipeline

pub mod catalog;
pub mod checkpoint;
pub mod legacy;
pub mod portable_text;

pub use catalog::{CatalogStats, MappedProperty, PropertyRecord, PropertyStatus};
pub use checkpoint::{
    ImportCheckpoint, ImportErrorEntry, ImportStats, RetryEntry, RunState, MAX_RETRY_ATTEMPTS,
    RUN_LEASE_SECONDS,
};
pub use legacy::LegacyPropertyRecord;
pub use portable_text::{Block, BlockType, PortableTextDocument, Span, SpanType};
