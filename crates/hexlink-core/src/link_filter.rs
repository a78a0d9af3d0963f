//! # Scalable Link Filter
//!
//! A probabilistic set of property values declared interesting for linking.
//!
//! The filter is a stack of Bloom filter layers. When the newest layer has
//! absorbed as many values as it was sized for, a larger layer with a
//! tighter error rate is appended, so the compound false-positive rate stays
//! near the configured target however many values arrive.
//!
//! ## Guarantees
//!
//! - No false negatives: every added value tests positive forever.
//! - False positives cost only an extra existence lookup downstream; a link
//!   is never created from filter membership alone.
//! - [`ScalableLinkFilter`] is safe for concurrent `add`/`test` from every
//!   running pipeline.

use crate::formats;
use crate::primitives::{
    DEFAULT_FALSE_POSITIVE_RATE, DEFAULT_FILTER_CAPACITY, FILTER_GROWTH_FACTOR,
    FILTER_TIGHTENING_RATIO,
};
use crate::HexlinkError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::hash::Hasher;
use std::path::Path;
use twox_hash::XxHash64;

/// Seed of the second digest used for double hashing.
const SECOND_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

// =============================================================================
// HASHING
// =============================================================================

/// Two independent 64-bit digests of `value`.
///
/// Bit positions are derived as `h1 + i * h2`; forcing `h2` odd keeps the
/// probe sequence from collapsing onto a single bit.
fn digest(value: &str) -> (u64, u64) {
    let mut first = XxHash64::with_seed(0);
    first.write(value.as_bytes());
    let mut second = XxHash64::with_seed(SECOND_SEED);
    second.write(value.as_bytes());
    (first.finish(), second.finish() | 1)
}

// =============================================================================
// BLOOM LAYER
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BloomLayer {
    bits: Vec<u64>,
    num_bits: u64,
    hashes: u32,
    capacity: u64,
    count: u64,
}

/// Bit and hash counts for the layer at `depth`.
///
/// The layer error rate is `p * r^depth`, then `m = -n ln(p) / ln(2)^2`
/// bits and `k = (m / n) ln(2)` hash functions.
#[allow(clippy::float_arithmetic)]
fn layer_sizing(capacity: u64, error_rate: f64, depth: usize) -> (u64, u32) {
    let n = capacity as f64;
    let ln2 = std::f64::consts::LN_2;
    let p = error_rate * FILTER_TIGHTENING_RATIO.powi(depth as i32);

    let num_bits = ((-n * p.ln()) / (ln2 * ln2)).ceil().max(64.0) as u64;
    let hashes = ((num_bits as f64 / n) * ln2).ceil().max(1.0) as u32;
    (num_bits, hashes)
}

impl BloomLayer {
    /// Size a layer for `capacity` values at depth `depth` of the stack.
    fn sized_for(capacity: u64, error_rate: f64, depth: usize) -> Self {
        let capacity = capacity.max(1);
        let (num_bits, hashes) = layer_sizing(capacity, error_rate, depth);

        Self {
            bits: vec![0; num_bits.div_ceil(64) as usize],
            num_bits,
            hashes,
            capacity,
            count: 0,
        }
    }

    fn is_well_formed(&self) -> bool {
        self.num_bits > 0
            && self.hashes > 0
            && self.capacity > 0
            && self.bits.len() as u64 == self.num_bits.div_ceil(64)
    }

    fn is_full(&self) -> bool {
        self.count >= self.capacity
    }

    fn position(&self, (h1, h2): (u64, u64), i: u64) -> (usize, u64) {
        let bit = h1.wrapping_add(i.wrapping_mul(h2)) % self.num_bits;
        ((bit / 64) as usize, 1u64 << (bit % 64))
    }

    fn insert(&mut self, digest: (u64, u64)) {
        for i in 0..u64::from(self.hashes) {
            let (word, mask) = self.position(digest, i);
            self.bits[word] |= mask;
        }
        self.count = self.count.saturating_add(1);
    }

    fn contains(&self, digest: (u64, u64)) -> bool {
        (0..u64::from(self.hashes)).all(|i| {
            let (word, mask) = self.position(digest, i);
            self.bits[word] & mask != 0
        })
    }
}

// =============================================================================
// SCALABLE BLOOM FILTER
// =============================================================================

/// Growable Bloom filter (single-threaded core).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalableBloomFilter {
    layers: Vec<BloomLayer>,
    error_rate: f64,
    initial_capacity: u64,
}

impl ScalableBloomFilter {
    /// Create an empty filter targeting `error_rate`.
    #[must_use]
    pub fn new(error_rate: f64, initial_capacity: u64) -> Self {
        let error_rate = if error_rate > 0.0 && error_rate < 1.0 {
            error_rate
        } else {
            DEFAULT_FALSE_POSITIVE_RATE
        };
        Self {
            layers: vec![BloomLayer::sized_for(initial_capacity, error_rate, 0)],
            error_rate,
            initial_capacity: initial_capacity.max(1),
        }
    }

    /// Add a value. Returns `false` if it already tested positive.
    pub fn add(&mut self, value: &str) -> bool {
        let digest = digest(value);
        if self.layers.iter().any(|layer| layer.contains(digest)) {
            return false;
        }
        if self.layers.last().is_none_or(BloomLayer::is_full) {
            self.grow();
        }
        if let Some(layer) = self.layers.last_mut() {
            layer.insert(digest);
        }
        true
    }

    /// Membership test: never false for an added value.
    #[must_use]
    pub fn test(&self, value: &str) -> bool {
        let digest = digest(value);
        self.layers.iter().any(|layer| layer.contains(digest))
    }

    /// Number of distinct values added (as far as the filter can tell).
    #[must_use]
    pub fn len(&self) -> u64 {
        self.layers.iter().map(|layer| layer.count).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of layers allocated so far.
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Reject decoded state that would break bit addressing.
    pub fn validate(&self) -> Result<(), HexlinkError> {
        if !(self.error_rate > 0.0 && self.error_rate < 1.0) {
            return Err(HexlinkError::SerializationError(format!(
                "link filter error rate {} outside (0, 1)",
                self.error_rate
            )));
        }
        if self.initial_capacity == 0 || self.layers.is_empty() {
            return Err(HexlinkError::SerializationError(
                "link filter has no layers".to_string(),
            ));
        }
        if let Some(depth) = self.layers.iter().position(|layer| !layer.is_well_formed()) {
            return Err(HexlinkError::SerializationError(format!(
                "link filter layer {} is malformed",
                depth
            )));
        }
        Ok(())
    }

    fn grow(&mut self) {
        let depth = self.layers.len();
        let capacity = self
            .initial_capacity
            .saturating_mul(FILTER_GROWTH_FACTOR.saturating_pow(depth as u32));
        self.layers
            .push(BloomLayer::sized_for(capacity, self.error_rate, depth));
    }
}

impl Default for ScalableBloomFilter {
    fn default() -> Self {
        Self::new(DEFAULT_FALSE_POSITIVE_RATE, DEFAULT_FILTER_CAPACITY)
    }
}

// =============================================================================
// SHARED LINK FILTER
// =============================================================================

/// The link filter as seen by pipelines.
///
/// Owned by the store instance and lent to every run.
pub trait LinkFilter: Send + Sync {
    /// Declare a value interesting for linking.
    fn add(&self, value: &str);

    /// Whether a value may have been declared.
    fn test(&self, value: &str) -> bool;

    /// Write the filter state to `path`.
    fn persist_to(&self, path: &Path) -> Result<(), HexlinkError>;
}

/// Thread-safe [`ScalableBloomFilter`].
#[derive(Debug, Default)]
pub struct ScalableLinkFilter {
    inner: RwLock<ScalableBloomFilter>,
}

impl ScalableLinkFilter {
    #[must_use]
    pub fn new(error_rate: f64, initial_capacity: u64) -> Self {
        Self::from_filter(ScalableBloomFilter::new(error_rate, initial_capacity))
    }

    #[must_use]
    pub fn from_filter(filter: ScalableBloomFilter) -> Self {
        Self {
            inner: RwLock::new(filter),
        }
    }

    /// Restore a filter from `path`, or start fresh if the file is absent.
    ///
    /// A present but unreadable file is an error, never a silent reset.
    pub fn load_from(
        path: &Path,
        error_rate: f64,
        initial_capacity: u64,
    ) -> Result<Self, HexlinkError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no link filter file, starting fresh");
            return Ok(Self::new(error_rate, initial_capacity));
        }
        let bytes = std::fs::read(path)?;
        let filter = formats::filter_from_bytes(&bytes)?;
        tracing::info!(
            path = %path.display(),
            values = filter.len(),
            layers = filter.layer_count(),
            "link filter loaded"
        );
        Ok(Self::from_filter(filter))
    }

    /// Number of distinct values added.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.inner.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current filter state.
    #[must_use]
    pub fn snapshot(&self) -> ScalableBloomFilter {
        self.inner.read().clone()
    }
}

impl LinkFilter for ScalableLinkFilter {
    fn add(&self, value: &str) {
        if self.inner.read().test(value) {
            return;
        }
        self.inner.write().add(value);
    }

    fn test(&self, value: &str) -> bool {
        self.inner.read().test(value)
    }

    fn persist_to(&self, path: &Path) -> Result<(), HexlinkError> {
        let bytes = formats::filter_to_bytes(&self.inner.read())?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let staging = path.with_extension("sbf.tmp");
        std::fs::write(&staging, &bytes)?;
        std::fs::rename(&staging, path)?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "link filter persisted");
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn added_values_test_positive() {
        let mut filter = ScalableBloomFilter::default();
        assert!(filter.add("S1"));
        assert!(!filter.add("S1"));

        assert!(filter.test("S1"));
        assert_eq!(filter.len(), 1);
    }

    #[test]
    fn grows_past_initial_capacity() {
        let mut filter = ScalableBloomFilter::new(0.01, 16);
        for i in 0..200 {
            filter.add(&format!("value-{i}"));
        }

        assert!(filter.layer_count() > 1);
        for i in 0..200 {
            assert!(filter.test(&format!("value-{i}")));
        }
    }

    #[test]
    fn false_positive_rate_is_bounded() {
        let mut filter = ScalableBloomFilter::new(0.01, 1000);
        for i in 0..1000 {
            filter.add(&format!("in-{i}"));
        }

        let false_positives = (0..10_000)
            .filter(|i| filter.test(&format!("out-{i}")))
            .count();
        // 1% target; allow generous slack for hash variance.
        assert!(false_positives < 300, "false positives: {false_positives}");
    }

    #[test]
    fn concurrent_add_and_test() {
        let filter = Arc::new(ScalableLinkFilter::new(0.01, 64));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let filter = Arc::clone(&filter);
                std::thread::spawn(move || {
                    for i in 0..500 {
                        let value = format!("{t}-{i}");
                        filter.add(&value);
                        assert!(filter.test(&value));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("join");
        }

        assert!(filter.test("3-499"));
        assert!(filter.snapshot().len() <= 2000);
    }

    #[test]
    fn persist_and_load() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("sbf").join("featureLinks.sbf");

        let filter = ScalableLinkFilter::new(0.01, 100);
        filter.add("StudentRefId-value");
        filter.persist_to(&path).expect("persist");

        let restored = ScalableLinkFilter::load_from(&path, 0.01, 100).expect("load");
        assert!(restored.test("StudentRefId-value"));
        assert_eq!(restored.snapshot(), filter.snapshot());
    }

    #[test]
    fn missing_file_starts_fresh() {
        let temp = tempdir().expect("temp dir");
        let filter =
            ScalableLinkFilter::load_from(&temp.path().join("absent.sbf"), 0.01, 100).expect("load");
        assert!(filter.snapshot().is_empty());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("corrupt.sbf");
        std::fs::write(&path, b"HXSB\x01garbage").expect("write");

        let result = ScalableLinkFilter::load_from(&path, 0.01, 100);
        assert!(matches!(result, Err(HexlinkError::SerializationError(_))));
    }

    fn filter_with_layer(bits: Vec<u64>, num_bits: u64, hashes: u32) -> ScalableBloomFilter {
        ScalableBloomFilter {
            layers: vec![BloomLayer {
                bits,
                num_bits,
                hashes,
                capacity: 16,
                count: 0,
            }],
            error_rate: 0.01,
            initial_capacity: 16,
        }
    }

    #[test]
    fn malformed_layers_are_rejected_on_load() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("layers.sbf");
        let broken = [
            filter_with_layer(Vec::new(), 0, 3),
            filter_with_layer(vec![0; 1], 256, 3),
            filter_with_layer(vec![0; 4], 256, 0),
        ];

        for filter in &broken {
            let bytes = formats::filter_to_bytes(filter).expect("serialize");
            std::fs::write(&path, bytes).expect("write");

            let result = ScalableLinkFilter::load_from(&path, 0.01, 100);
            assert!(matches!(result, Err(HexlinkError::SerializationError(_))));
        }
    }

    #[test]
    fn bad_error_rate_or_empty_stack_rejected() {
        let mut filter = ScalableBloomFilter::new(0.01, 16);
        filter.error_rate = 1.5;
        assert!(filter.validate().is_err());

        let mut filter = ScalableBloomFilter::new(0.01, 16);
        filter.layers.clear();
        assert!(filter.validate().is_err());

        assert!(ScalableBloomFilter::new(0.01, 16).validate().is_ok());
    }
}
