//! Flow Feature Layout
//!
//! The encoder's column order is versioned: adding, removing or
//! reordering a column bumps `FEATURE_VERSION`.
//!
//! Checkpoints trained on this layout record its version and hash, so a
//! detector refuses a model whose layout no longer matches the encoder.

use std::sync::OnceLock;

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

pub const FEATURE_VERSION: u8 = 1;

/// Columns in the order `FlowRecord::features` emits them
pub const FLOW_FEATURE_LAYOUT: &[&str] = &[
    "duration",             // seconds / 100
    "protocol",             // IP protocol number / 17
    "src_bytes",            // / 50000
    "dst_bytes",            // / 50000
    "packets",              // / 200
    "tcp_flags",            // flag byte / 255
    "active_time",          // seconds / 100
    "idle_time",            // seconds / 100
    "src_byte_ratio",       // src / (src + dst)
    "src_bytes_per_packet",
    "dst_bytes_per_packet",
];

pub const FEATURE_COUNT: usize = 11;

/// CRC32 over the version byte and the NUL-separated column names
pub fn layout_hash() -> u32 {
    static HASH: OnceLock<u32> = OnceLock::new();
    *HASH.get_or_init(|| {
        let mut hasher = Hasher::new();
        hasher.update(&[FEATURE_VERSION]);
        for name in FLOW_FEATURE_LAYOUT {
            hasher.update(name.as_bytes());
            hasher.update(&[0]);
        }
        hasher.finalize()
    })
}

// ============================================================================
// LAYOUT INFO
// ============================================================================

/// Layout stamp stored in a checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub version: u8,
    pub hash: u32,
    pub feature_count: usize,
}

impl LayoutInfo {
    pub fn current() -> Self {
        Self {
            version: FEATURE_VERSION,
            hash: layout_hash(),
            feature_count: FEATURE_COUNT,
        }
    }

    /// Stamp for a training table, if its columns are exactly the runtime layout
    pub fn for_columns<S: AsRef<str>>(columns: &[S]) -> Option<Self> {
        let matches = columns.len() == FEATURE_COUNT
            && columns.iter().zip(FLOW_FEATURE_LAYOUT).all(|(c, l)| c.as_ref() == *l);
        matches.then(Self::current)
    }

    pub fn verify(&self) -> Result<(), LayoutMismatchError> {
        validate_layout(self.version, self.hash)
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutMismatchError {
    pub expected_version: u8,
    pub expected_hash: u32,
    pub actual_version: u8,
    pub actual_hash: u32,
}

impl std::fmt::Display for LayoutMismatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "model trained on flow layout v{} ({:08x}), encoder is v{} ({:08x})",
            self.actual_version, self.actual_hash, self.expected_version, self.expected_hash
        )
    }
}

impl std::error::Error for LayoutMismatchError {}

pub fn validate_layout(version: u8, hash: u32) -> Result<(), LayoutMismatchError> {
    let expected_hash = layout_hash();
    if version == FEATURE_VERSION && hash == expected_hash {
        return Ok(());
    }

    Err(LayoutMismatchError {
        expected_version: FEATURE_VERSION,
        expected_hash,
        actual_version: version,
        actual_hash: hash,
    })
}
