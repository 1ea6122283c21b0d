/*!
 * Container Configuration
 *
 * CPU-topology-aware bucket sizing for the sharded map. The table never
 * resizes, so the bucket count is picked once here from the host's available
 * parallelism and the expected contention.
 *
 * Design:
 * - Power-of-2 bucket counts spread hashes evenly under `mod capacity`
 * - CPU-proportional scaling: more cores = more concurrent writers to spread
 * - Computed on demand, no process-wide state
 */

use serde::{Deserialize, Serialize};

/// Lower bound on computed bucket counts
pub const MIN_BUCKETS: usize = 8;

/// Upper bound on computed bucket counts
pub const MAX_BUCKETS: usize = 512;

/// Fallback when available parallelism cannot be detected
const FALLBACK_CPUS: usize = 8;

/// Expected access pattern for a container instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadProfile {
    /// Many writers hammering the table (4x CPUs)
    HighContention,
    /// Mixed readers and writers (2x CPUs)
    MediumContention,
    /// Mostly reads or rare access (1x CPUs)
    LowContention,
}

impl WorkloadProfile {
    #[inline]
    const fn multiplier(self) -> usize {
        match self {
            WorkloadProfile::HighContention => 4,
            WorkloadProfile::MediumContention => 2,
            WorkloadProfile::LowContention => 1,
        }
    }
}

/// Number of CPUs the scheduler will run us on
pub fn cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or_else(|_| {
            tracing::warn!(
                fallback = FALLBACK_CPUS,
                "Failed to detect CPU count, using fallback"
            );
            FALLBACK_CPUS
        })
}

/// Calculate a bucket count for the given workload profile
///
/// Result is a power of two clamped to `[MIN_BUCKETS, MAX_BUCKETS]`.
pub fn bucket_count(profile: WorkloadProfile) -> usize {
    scaled_bucket_count(cpu_count(), profile)
}

#[inline]
fn scaled_bucket_count(cpus: usize, profile: WorkloadProfile) -> usize {
    (cpus.max(1) * profile.multiplier())
        .next_power_of_two()
        .clamp(MIN_BUCKETS, MAX_BUCKETS)
}

/// Sharded map configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapConfig {
    /// Fixed number of buckets for the table's lifetime
    pub buckets: usize,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self::for_profile(WorkloadProfile::MediumContention)
    }
}

impl MapConfig {
    /// Configuration with an explicit bucket count
    pub const fn with_buckets(buckets: usize) -> Self {
        Self { buckets }
    }

    /// Configuration sized for the given workload on this host
    pub fn for_profile(profile: WorkloadProfile) -> Self {
        Self {
            buckets: bucket_count(profile),
        }
    }

    /// Configuration optimized for many concurrent writers
    pub fn high_contention() -> Self {
        Self::for_profile(WorkloadProfile::HighContention)
    }

    /// Configuration optimized for read-mostly or rarely touched tables
    pub fn low_contention() -> Self {
        Self::for_profile(WorkloadProfile::LowContention)
    }
}
