//! # Link Filter File Format
//!
//! Binary serialization for the scalable link filter, written once at
//! store close and read once at store open.
//!
//! Format: Header (5 bytes) + postcard-serialized filter data.
//! - 4 bytes: Magic ("HXSB")
//! - 1 byte: Version
//!
//! The header and size limit are validated before the payload is parsed,
//! so a truncated or foreign file fails fast without large allocations.

use crate::link_filter::ScalableBloomFilter;
use crate::{HexlinkError, primitives};

// =============================================================================
// LIMITS
// =============================================================================

/// Maximum allowed size of a filter file.
///
/// Validated BEFORE attempting deserialization.
pub const MAX_FILTER_FILE_SIZE: usize = 256 * 1024 * 1024; // 256 MB

/// Header length in bytes.
const HEADER_SIZE: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The persistence header precedes all filter data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Create a new header with current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Validate the header.
    pub fn validate(&self) -> Result<(), HexlinkError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(HexlinkError::SerializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(HexlinkError::SerializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Write header to bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    /// Read header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HexlinkError> {
        if bytes.len() < HEADER_SIZE {
            return Err(HexlinkError::SerializationError(
                "Header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a filter to bytes (header + payload).
pub fn filter_to_bytes(filter: &ScalableBloomFilter) -> Result<Vec<u8>, HexlinkError> {
    let payload = postcard::to_stdvec(filter)
        .map_err(|e| HexlinkError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_SIZE + payload.len());
    result.extend_from_slice(&PersistenceHeader::new().to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Deserialize a filter from bytes.
pub fn filter_from_bytes(bytes: &[u8]) -> Result<ScalableBloomFilter, HexlinkError> {
    if bytes.len() > MAX_FILTER_FILE_SIZE {
        return Err(HexlinkError::SerializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_FILTER_FILE_SIZE
        )));
    }

    let header = PersistenceHeader::from_bytes(bytes)?;
    header.validate()?;

    let filter: ScalableBloomFilter = postcard::from_bytes(&bytes[HEADER_SIZE..]).map_err(|e| {
        HexlinkError::SerializationError(format!("Failed to deserialize link filter: {}", e))
    })?;
    filter.validate()?;
    Ok(filter)
}

// =============================================================================
// TESTS
// =============================================================================
