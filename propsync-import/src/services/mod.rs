//! Business logic services for the import pipeline

pub mod field_mapper;
pub mod html_normalizer;
pub mod import_driver;
pub mod photo_resolver;
pub mod sql_source;

pub use import_driver::{ImportDriver, DEFAULT_BATCH_SIZE};
