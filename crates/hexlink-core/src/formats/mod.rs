//! # Formats
//!
//! On-disk formats owned by the engine. The hexastore itself lives in
//! redb; only the link filter needs a format of its own.

pub mod persistence;

pub use persistence::{PersistenceHeader, filter_from_bytes, filter_to_bytes};
