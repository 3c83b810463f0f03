//! Progress aggregation
//!
//! Engines report completed *decoded* bytes. For a single archive that value
//! is forwarded as-is. Across a multi-volume set the host wants *packed*
//! bytes, so each report is scaled by `packed_total / unpacked_total` and
//! offset by what earlier volumes already consumed.

use tracing::debug;

/// Operands are shifted right until they fit below this bound
const NORMALIZE_LIMIT: u64 = 1 << 31;

fn normalize(v1: &mut u64, v2: &mut u64) {
    while *v1 > NORMALIZE_LIMIT {
        *v1 >>= 1;
        *v2 >>= 1;
    }
}

/// Compute `unpacked_current * packed_total / unpacked_total` without overflow
///
/// Both products are bounded by 2^62 after normalization; a zero divisor is
/// treated as 1.
pub fn mul_div(unpacked_current: u64, unpacked_total: u64, packed_total: u64) -> u64 {
    let (mut cur, mut unp, mut packed) = (unpacked_current, unpacked_total, packed_total);
    normalize(&mut packed, &mut unp);
    normalize(&mut cur, &mut unp);
    if unp == 0 {
        unp = 1;
    }
    cur * packed / unp
}

/// Progress state for the active volume
#[derive(Debug, Clone)]
pub struct ProgressAggregator {
    multi_volume: bool,
    unpacked_total: u64,
    packed_total: u64,
    prior_packed: u64,
    last_reported: Option<u64>,
}

impl ProgressAggregator {
    /// Create an aggregator; `packed_total` only matters in multi-volume mode
    pub fn new(multi_volume: bool, packed_total: u64) -> Self {
        Self {
            multi_volume,
            unpacked_total: 1,
            packed_total,
            prior_packed: 0,
            last_reported: None,
        }
    }

    /// Whether reports are scaled into packed bytes
    pub fn is_multi_volume(&self) -> bool {
        self.multi_volume
    }

    /// Start the next volume of a multi-volume set
    pub fn begin_volume(&mut self, prior_packed: u64, packed_total: u64) {
        debug!(prior_packed, packed_total, "progress moved to next volume");
        self.prior_packed = prior_packed;
        self.packed_total = packed_total;
        self.unpacked_total = 1;
    }

    /// Record the engine's total decoded size
    ///
    /// Returns the value to forward to the host, which is `None` in
    /// multi-volume mode where the host's total is the packed size.
    pub fn set_total(&mut self, unpacked_total: u64) -> Option<u64> {
        self.unpacked_total = unpacked_total;
        (!self.multi_volume).then_some(unpacked_total)
    }

    /// Translate a completed-decoded-bytes report into the value to forward
    pub fn completed(&mut self, unpacked_current: u64) -> u64 {
        let value = if self.multi_volume {
            self.prior_packed
                + mul_div(unpacked_current, self.unpacked_total, self.packed_total)
        } else {
            unpacked_current
        };
        self.last_reported = Some(value);
        value
    }

    /// Last value handed to the host
    pub fn last_reported(&self) -> Option<u64> {
        self.last_reported
    }
}
