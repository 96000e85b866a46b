//! Fixed-capacity FIFO modeling an on-chip hardware queue.

use std::collections::VecDeque;

/// Bounded FIFO. Pushing into a full queue fails without changing it; this is the only
/// admission control the intermediary uses.
#[derive(Debug, Clone)]
pub struct BoundedQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends `value`, or hands it back if the queue is at capacity.
    pub fn push(&mut self, value: T) -> Result<(), T> {
        if self.is_full() {
            return Err(value);
        }
        self.items.push_back(value);
        Ok(())
    }

    /// Removes the head. Returns `None` (and does nothing) when empty.
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Passes the head to `send`. If `send` hands it back, it is restored as the head so
    /// a later attempt sees the same entry. Returns whether the head was consumed.
    pub fn offer_front<F>(&mut self, send: F) -> bool
    where
        F: FnOnce(T) -> Result<(), T>,
    {
        let Some(head) = self.items.pop_front() else {
            return false;
        };
        match send(head) {
            Ok(()) => true,
            Err(head) => {
                self.items.push_front(head);
                false
            }
        }
    }

    pub fn front(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn back(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn push_fails_at_capacity() {
        let mut q = BoundedQueue::new(2);
        assert_eq!(q.push(1), Ok(()));
        assert_eq!(q.push(2), Ok(()));
        assert_eq!(q.push(3), Err(3));
        assert_eq!(q.len(), 2);
        assert_eq!(q.front(), Some(&1));
        assert_eq!(q.back(), Some(&2));
    }

    #[test]
    fn pop_on_empty_is_noop() {
        let mut q: BoundedQueue<u8> = BoundedQueue::new(1);
        assert!(q.pop().is_none());
        assert!(q.is_empty());
        assert!(q.front().is_none());
    }

    #[test]
    fn zero_capacity_rejects_everything() {
        let mut q = BoundedQueue::new(0);
        assert!(q.is_full());
        assert_eq!(q.push('a'), Err('a'));
    }

    #[test]
    fn rejected_offer_keeps_head_in_place() {
        let mut q = BoundedQueue::new(3);
        q.push("a").unwrap();
        q.push("b").unwrap();
        assert!(!q.offer_front(Err));
        assert_eq!(q.front(), Some(&"a"));
        assert_eq!(q.len(), 2);

        let mut taken = None;
        assert!(q.offer_front(|v| {
            taken = Some(v);
            Ok(())
        }));
        assert_eq!(taken, Some("a"));
        assert_eq!(q.front(), Some(&"b"));
    }

    #[test]
    fn offer_on_empty_does_not_call_sender() {
        let mut q: BoundedQueue<u32> = BoundedQueue::new(1);
        assert!(!q.offer_front(|_| panic!("sender called on empty queue")));
    }

    proptest! {
        #[test]
        fn size_never_exceeds_capacity(
            capacity in 0usize..8,
            ops in proptest::collection::vec(any::<bool>(), 0..64),
        ) {
            let mut q = BoundedQueue::new(capacity);
            let mut next = 0u32;
            for push in ops {
                if push {
                    let was_full = q.len() == capacity;
                    let res = q.push(next);
                    prop_assert_eq!(res.is_err(), was_full);
                    next += 1;
                } else {
                    q.pop();
                }
                prop_assert!(q.len() <= capacity);
            }
        }

        #[test]
        fn pops_in_push_order(values in proptest::collection::vec(any::<u16>(), 0..32)) {
            let mut q = BoundedQueue::new(values.len());
            for v in &values {
                prop_assert!(q.push(*v).is_ok());
            }
            let drained: Vec<u16> = std::iter::from_fn(|| q.pop()).collect();
            prop_assert_eq!(drained, values);
        }
    }
}
