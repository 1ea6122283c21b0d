/*!
 * Two-Lock FIFO Queue
 *
 * Unbounded queue with separate head and tail mutexes so producers and
 * consumers do not contend with each other.
 *
 * # Design: Dummy Tail Node
 *
 * ```text
 * head                              tail
 *  |                                 |
 *  v                                 v
 * [data a] -> [data b] -> [data c] -> [dummy] -> null
 * ```
 *
 * `push` fills the dummy with the payload and appends a fresh dummy, so it
 * only ever writes the node `tail` points at. Consumers only ever touch the
 * node `head` points at, and only while `head != tail`. The two sides meet at
 * a single node only when the queue is empty, and then the consumer backs off.
 *
 * # Wakeups
 *
 * Consumers park on a condvar paired with the head mutex. Producers never take
 * the head mutex on the fast path; they only do so briefly when the waiter
 * count says someone is parked, which closes the window between a consumer's
 * emptiness check and its park.
 */

use crate::errors::{ContainerError, ContainerResult};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

struct Node<T> {
    data: Option<Arc<T>>,
    /// Owning link, produced by `Box::into_raw`; null for the dummy
    next: *mut Node<T>,
}

impl<T> Node<T> {
    fn dummy() -> *mut Self {
        Box::into_raw(Box::new(Self {
            data: None,
            next: ptr::null_mut(),
        }))
    }
}

/// One end of the queue: a node pointer and the lock that owns it
#[repr(C, align(64))] // Cache-line aligned to prevent false sharing between ends
struct End<T> {
    node: Mutex<*mut Node<T>>,
}

impl<T> End<T> {
    fn new(node: *mut Node<T>) -> Self {
        Self {
            node: Mutex::new(node),
        }
    }
}

/// Unbounded FIFO queue with independent producer and consumer locks
///
/// # Performance
///
/// - `push` takes only the tail lock: O(1)
/// - `try_pop` takes the head lock plus a brief tail read: O(1)
/// - Producers only contend with producers, consumers with consumers
///
/// # Example
///
/// ```
/// use finelock::sync::TwoLockQueue;
/// use std::sync::Arc;
/// use std::thread;
///
/// let queue = Arc::new(TwoLockQueue::new());
/// let consumer = {
///     let queue = queue.clone();
///     thread::spawn(move || *queue.wait_and_pop())
/// };
///
/// queue.push(7);
/// assert_eq!(consumer.join().unwrap(), 7);
/// assert!(queue.is_empty());
/// ```
pub struct TwoLockQueue<T> {
    head: End<T>,
    tail: End<T>,
    available: Condvar,
    /// Consumers currently inside a guarded wait
    waiters: AtomicUsize,
}

impl<T> TwoLockQueue<T> {
    /// Create an empty queue (head and tail on the same dummy node)
    pub fn new() -> Self {
        let dummy = Node::dummy();
        Self {
            head: End::new(dummy),
            tail: End::new(dummy),
            available: Condvar::new(),
            waiters: AtomicUsize::new(0),
        }
    }

    /// Current tail pointer, read under the tail lock
    #[inline]
    fn tail(&self) -> *mut Node<T> {
        *self.tail.node.lock()
    }

    /// Push a value
    #[inline]
    pub fn push(&self, value: T) {
        self.push_shared(Arc::new(value));
    }

    /// Push an already shared value
    pub fn push_shared(&self, data: Arc<T>) {
        let dummy = Node::dummy();
        {
            let mut tail = self.tail.node.lock();
            // SAFETY: the tail node is live (only freed after head moves past
            // it, which needs head != tail) and only written under this lock.
            unsafe {
                (**tail).data = Some(data);
                (**tail).next = dummy;
            }
            *tail = dummy;
        }

        if self.waiters.load(Ordering::SeqCst) > 0 {
            // Serialize with a consumer between its emptiness check and its park
            let _head = self.head.node.lock();
            self.available.notify_one();
        }
    }

    /// Detach the head node's payload and advance head
    ///
    /// Caller holds the head lock and has seen `head != tail`.
    fn pop_head(head: &mut MutexGuard<'_, *mut Node<T>>) -> Arc<T> {
        // SAFETY: head != tail, so the producer finished with this node before
        // releasing the tail lock we since acquired, and nobody else can reach
        // it without the head lock we hold.
        let node = unsafe { Box::from_raw(**head) };
        **head = node.next;
        match node.data {
            Some(data) => data,
            None => unreachable!("queue node ahead of the tail carries no payload"),
        }
    }

    /// Pop the front value if there is one
    pub fn try_pop(&self) -> Option<Arc<T>> {
        let mut head = self.head.node.lock();
        if *head == self.tail() {
            return None;
        }
        Some(Self::pop_head(&mut head))
    }

    /// Block until a value is available, then pop it
    pub fn wait_and_pop(&self) -> Arc<T> {
        let mut head = self.head.node.lock();
        if *head == self.tail() {
            trace!("queue empty, waiting for data");
            self.waiters.fetch_add(1, Ordering::SeqCst);
            while *head == self.tail() {
                self.available.wait(&mut head);
            }
            self.waiters.fetch_sub(1, Ordering::SeqCst);
        }
        Self::pop_head(&mut head)
    }

    /// Like [`wait_and_pop`](Self::wait_and_pop), giving up after `timeout`
    ///
    /// A timeout too large to express as a deadline waits without one.
    pub fn wait_and_pop_timeout(&self, timeout: Duration) -> ContainerResult<Arc<T>> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Ok(self.wait_and_pop());
        };
        let mut head = self.head.node.lock();
        if *head == self.tail() {
            self.waiters.fetch_add(1, Ordering::SeqCst);
            while *head == self.tail() {
                if self.available.wait_until(&mut head, deadline).timed_out()
                    && *head == self.tail()
                {
                    self.waiters.fetch_sub(1, Ordering::SeqCst);
                    debug!(?timeout, "timed out waiting for queue data");
                    return Err(ContainerError::Timeout(timeout));
                }
            }
            self.waiters.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(Self::pop_head(&mut head))
    }

    /// Check whether the queue has no values
    pub fn is_empty(&self) -> bool {
        let head = self.head.node.lock();
        *head == self.tail()
    }

    /// Alias for [`is_empty`](Self::is_empty)
    #[inline]
    pub fn empty(&self) -> bool {
        self.is_empty()
    }
}

impl<T> Default for TwoLockQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for TwoLockQueue<T> {
    fn drop(&mut self) {
        let mut current = *self.head.node.get_mut();
        while !current.is_null() {
            // SAFETY: we have exclusive access and every node from head to the
            // dummy tail came from `Box::into_raw` and is owned by the chain.
            let node = unsafe { Box::from_raw(current) };
            current = node.next;
        }
    }
}

impl<T> fmt::Debug for TwoLockQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwoLockQueue")
            .field("waiters", &self.waiters.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

// Safety: node pointers are only dereferenced under the lock that owns them,
// and payloads are handed across threads as Arc<T>
unsafe impl<T: Send + Sync> Send for TwoLockQueue<T> {}
unsafe impl<T: Send + Sync> Sync for TwoLockQueue<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let queue = TwoLockQueue::new();
        assert!(queue.is_empty());
        assert!(queue.try_pop().is_none());

        for i in 1..=3 {
            queue.push(i);
        }
        assert!(!queue.empty());

        assert_eq!(*queue.wait_and_pop(), 1);
        assert_eq!(queue.try_pop().as_deref(), Some(&2));
        assert_eq!(*queue.wait_and_pop(), 3);
        assert!(queue.is_empty());
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn test_push_shared_returns_same_allocation() {
        let queue = TwoLockQueue::new();
        let value = Arc::new(String::from("shared"));
        queue.push_shared(value.clone());

        let popped = queue.try_pop().unwrap();
        assert!(Arc::ptr_eq(&value, &popped));
    }

    #[test]
    fn test_wait_blocks_until_push() {
        let queue = Arc::new(TwoLockQueue::new());
        let queue_clone = queue.clone();

        let handle = thread::spawn(move || *queue_clone.wait_and_pop());

        // Give consumer time to park
        thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished());

        queue.push(42u64);
        assert_eq!(handle.join().unwrap(), 42);
    }

    #[test]
    fn test_timeout() {
        let queue = TwoLockQueue::<u32>::new();
        let start = Instant::now();
        let result = queue.wait_and_pop_timeout(Duration::from_millis(50));

        assert_eq!(result, Err(ContainerError::Timeout(Duration::from_millis(50))));
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(queue.waiters.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_timeout_with_data() {
        let queue = TwoLockQueue::new();
        queue.push(5);
        assert_eq!(*queue.wait_and_pop_timeout(Duration::from_millis(10)).unwrap(), 5);
    }

    #[test]
    fn test_unbounded_timeout() {
        let queue = Arc::new(TwoLockQueue::new());
        queue.push(1u8);
        assert_eq!(*queue.wait_and_pop_timeout(Duration::MAX).unwrap(), 1);

        let queue_clone = queue.clone();
        let handle = thread::spawn(move || queue_clone.wait_and_pop_timeout(Duration::MAX));

        thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished());

        queue.push(2);
        assert_eq!(*handle.join().unwrap().unwrap(), 2);
        assert_eq!(queue.waiters.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drop_with_pending_items() {
        let queue = TwoLockQueue::new();
        let tracked = Arc::new(());
        for _ in 0..100_000 {
            queue.push_shared(tracked.clone());
        }
        drop(queue);
        assert_eq!(Arc::strong_count(&tracked), 1);
    }
}
