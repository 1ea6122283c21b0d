/*!
 * Fine-Grained Linked List
 *
 * Singly linked list with one mutex per node and hand-over-hand traversal.
 *
 * # Locking Protocol
 *
 * ```text
 * [head] -> [a] -> [b] -> [c] -> None
 *   L        L                      lock(a) while holding head, then release head
 *            L      L               lock(b) while holding a, then release a
 * ```
 *
 * - A node's mutex guards its `next` link
 * - The next lock is taken *before* the current one is released
 * - Locks are only ever taken in list order, at most two at a time
 *
 * Since unlinking a node requires both its predecessor's lock and its own,
 * a traversal holding either of them can never see the node disappear.
 *
 * # Ownership
 *
 * Each link is the only structural owner of its successor. Traversals pin the
 * node they are about to lock with a temporary reference count so the owned
 * guard (`lock_arc`) can outlive the predecessor's guard. Payloads are stored
 * as `Arc<T>`, which is what lets `find_first_if` hand them out after every
 * lock has been released.
 */

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

type Link<T> = Option<Arc<Mutex<Node<T>>>>;

struct Node<T> {
    /// `None` only for the dummy head
    data: Option<Arc<T>>,
    next: Link<T>,
}

impl<T> Node<T> {
    const fn dummy() -> Self {
        Self {
            data: None,
            next: None,
        }
    }
}

/// Concurrent singly linked list with per-node locking
///
/// # Performance
///
/// - `push_front` only touches the head lock: O(1)
/// - Traversals hold at most two adjacent node locks
/// - Writers in different parts of the list proceed in parallel
///
/// # Example
///
/// ```
/// use finelock::sync::FineGrainedList;
///
/// let list: FineGrainedList<i32> = FineGrainedList::new();
/// for i in 0..10 {
///     list.push_front(i);
/// }
///
/// let mut sum = 0;
/// list.for_each(|x| sum += *x);
/// assert_eq!(sum, 45);
///
/// list.remove_if(|x| x % 2 != 0);
/// assert!(list.find_first_if(|x| *x == 3).is_none());
/// ```
pub struct FineGrainedList<T> {
    head: Arc<Mutex<Node<T>>>,
}

impl<T> FineGrainedList<T> {
    /// Create an empty list (just the dummy head)
    pub fn new() -> Self {
        Self {
            head: Arc::new(Mutex::new(Node::dummy())),
        }
    }

    /// Insert at the front, contending only on the head lock
    pub fn push_front(&self, value: T) {
        let data = Arc::new(value);
        let mut head = self.head.lock();
        let node = Node {
            data: Some(data),
            next: head.next.take(),
        };
        head.next = Some(Arc::new(Mutex::new(node)));
    }

    /// Visit every element in list order
    ///
    /// The visited node stays locked while `visit` runs, so `visit` must not
    /// call back into this list.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&T),
    {
        let mut prev = self.head.lock_arc();
        while let Some(next) = prev.next.clone() {
            let current = next.lock_arc();
            drop(prev);
            if let Some(data) = current.data.as_deref() {
                visit(data);
            }
            prev = current;
        }
    }

    /// Find the first element matching `predicate`
    ///
    /// The returned handle keeps the payload alive on its own, so it stays
    /// valid even if the element is removed right after.
    pub fn find_first_if<P>(&self, mut predicate: P) -> Option<Arc<T>>
    where
        P: FnMut(&T) -> bool,
    {
        let mut prev = self.head.lock_arc();
        while let Some(next) = prev.next.clone() {
            let current = next.lock_arc();
            drop(prev);
            if let Some(data) = &current.data {
                if predicate(data) {
                    return Some(Arc::clone(data));
                }
            }
            prev = current;
        }
        None
    }

    /// Unlink every element matching `predicate`, returning how many went
    ///
    /// The predicate runs with both the predecessor and the candidate locked.
    /// After a removal the predecessor lock is kept and reused for the
    /// candidate's successor.
    pub fn remove_if<P>(&self, mut predicate: P) -> usize
    where
        P: FnMut(&T) -> bool,
    {
        let mut removed = 0;
        let mut prev = self.head.lock_arc();
        while let Some(next) = prev.next.clone() {
            let mut current = next.lock_arc();
            let matched = current.data.as_deref().map_or(false, &mut predicate);
            if matched {
                prev.next = current.next.take();
                drop(current);
                removed += 1;
            } else {
                drop(prev);
                prev = current;
            }
        }
        trace!(removed, "remove_if finished");
        removed
    }

    /// Check whether the list has no elements
    pub fn is_empty(&self) -> bool {
        self.head.lock().next.is_none()
    }

    /// Alias for [`is_empty`](Self::is_empty)
    #[inline]
    pub fn empty(&self) -> bool {
        self.is_empty()
    }

    /// Count elements with a full hand-over-hand traversal
    ///
    /// Not a consistent count: other threads may insert or remove behind and
    /// ahead of the traversal while it runs.
    pub fn len(&self) -> usize {
        let mut count = 0;
        self.for_each(|_| count += 1);
        count
    }
}

impl<T> Default for FineGrainedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for FineGrainedList<T> {
    fn drop(&mut self) {
        // Unlink one node at a time; the default recursive drop would blow
        // the stack on long chains.
        let mut link = self.head.lock().next.take();
        while let Some(node) = link {
            link = node.lock().next.take();
        }
    }
}

impl<T> fmt::Debug for FineGrainedList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FineGrainedList").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn sum(list: &FineGrainedList<i32>) -> i32 {
        let mut total = 0;
        list.for_each(|x| total += *x);
        total
    }

    #[test]
    fn test_basic_operations() {
        let list: FineGrainedList<i32> = FineGrainedList::new();
        assert!(list.is_empty());
        assert!(list.empty());

        for i in 0..10 {
            list.push_front(i);
        }
        assert!(!list.is_empty());
        assert_eq!(list.len(), 10);
        assert_eq!(sum(&list), 45);

        for i in 0..10 {
            let found = list.find_first_if(|x| *x == i);
            assert_eq!(found.as_deref(), Some(&i));
        }

        assert_eq!(list.remove_if(|x| x % 2 != 0), 5);
        assert_eq!(sum(&list), 20);
        assert!(list.find_first_if(|x| x % 2 != 0).is_none());
    }

    #[test]
    fn test_push_front_order() {
        let list = FineGrainedList::new();
        list.push_front(1);
        list.push_front(2);
        list.push_front(3);

        let mut seen = Vec::new();
        list.for_each(|x| seen.push(*x));
        assert_eq!(seen, vec![3, 2, 1]);
    }

    #[test]
    fn test_remove_adjacent_and_all() {
        let list: FineGrainedList<i32> = FineGrainedList::new();
        for i in 0..6 {
            list.push_front(i);
        }

        // Consecutive matches exercise the "predecessor stays put" path
        assert_eq!(list.remove_if(|x| (2..=4).contains(x)), 3);
        let mut seen = Vec::new();
        list.for_each(|x| seen.push(*x));
        assert_eq!(seen, vec![5, 1, 0]);

        assert_eq!(list.remove_if(|_| true), 3);
        assert!(list.is_empty());
        assert_eq!(list.remove_if(|_| true), 0);
    }

    #[test]
    fn test_found_handle_outlives_removal() {
        let list = FineGrainedList::new();
        list.push_front(String::from("keep me"));

        let handle = list.find_first_if(|s| s.starts_with("keep")).unwrap();
        list.remove_if(|_| true);

        assert!(list.is_empty());
        assert_eq!(handle.as_str(), "keep me");
        assert_eq!(Arc::strong_count(&handle), 1);
    }

    #[test]
    fn test_long_list_drop() {
        let list = FineGrainedList::new();
        for i in 0..200_000 {
            list.push_front(i);
        }
        drop(list);
    }

    #[test]
    fn test_concurrent_push_front() {
        let list = Arc::new(FineGrainedList::new());
        let mut handles = vec![];

        for t in 0..8 {
            let list = list.clone();
            handles.push(thread::spawn(move || {
                for i in 0..500 {
                    list.push_front(t * 500 + i);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let mut seen = Vec::new();
        list.for_each(|x| seen.push(*x));
        seen.sort_unstable();
        assert_eq!(seen, (0..4000).collect::<Vec<_>>());
    }
}
