/*!
 * Fine-Grained Concurrent Containers
 *
 * Lock-based containers that spread contention across many small locks
 * instead of one global lock:
 * - Hand-over-hand locked singly linked list
 * - Two-lock FIFO queue with blocking consumers
 * - Sharded hash map with per-bucket reader/writer locks
 *
 * # Lock Ordering
 *
 * - List: node locks are taken in list order, at most two at a time
 * - Queue: the tail lock may nest inside the head lock, never the reverse
 * - Map: only `snapshot` holds several bucket locks, in ascending index order
 *
 * All three are independent; none is built on another.
 */

mod list;
mod map;
mod queue;

// Re-export public API
pub use list::FineGrainedList;
pub use map::ShardedMap;
pub use queue::TwoLockQueue;
