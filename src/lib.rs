/*!
 * Finelock
 * Fine-grained concurrent containers built on parking_lot locks
 */

pub mod config;
pub mod errors;
pub mod monitoring;
pub mod sync;

// Re-exports
pub use config::{MapConfig, WorkloadProfile};
pub use errors::*;
pub use monitoring::init_tracing;
pub use sync::{FineGrainedList, ShardedMap, TwoLockQueue};
