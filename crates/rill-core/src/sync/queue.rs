//! Wait queue of continuations parked on a promise cell

use crate::sync::Continuation;

/// Intrusive singly-linked chain of parked continuations.
///
/// The queue owns no synchronization of its own: callers serialize every
/// mutation through the cell's transient Locked state, and the draining
/// producer takes the whole chain in one swap.
pub(crate) struct WaitQueue<T> {
    head: Option<Box<Node<T>>>,
    len: usize,
}

/// Link node; the chain pointer is kept apart from the payload.
struct Node<T> {
    cont: Continuation<T>,
    next: Option<Box<Node<T>>>,
}

impl<T> WaitQueue<T> {
    pub(crate) const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    /// Append a continuation.
    pub(crate) fn push(&mut self, cont: Continuation<T>) {
        let next = self.head.take();
        self.head = Some(Box::new(Node { cont, next }));
        self.len += 1;
    }

    /// Take the entire chain, leaving the queue empty.
    ///
    /// The returned drain yields continuations in registration order.
    pub(crate) fn take(&mut self) -> Drain<T> {
        let mut taken = self.head.take();
        self.len = 0;

        // Nodes are pushed at the head, so reverse once to drain oldest-first.
        let mut reversed = None;
        while let Some(mut node) = taken {
            taken = node.next.take();
            node.next = reversed;
            reversed = Some(node);
        }
        Drain { head: reversed }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

impl<T> Drop for WaitQueue<T> {
    fn drop(&mut self) {
        drop_chain(self.head.take());
    }
}

/// Draining iterator over a taken chain.
pub(crate) struct Drain<T> {
    head: Option<Box<Node<T>>>,
}

impl<T> Iterator for Drain<T> {
    type Item = Continuation<T>;

    fn next(&mut self) -> Option<Continuation<T>> {
        let mut node = self.head.take()?;
        self.head = node.next.take();
        Some(node.cont)
    }
}

impl<T> Drop for Drain<T> {
    fn drop(&mut self) {
        drop_chain(self.head.take());
    }
}

// Box chains must be unlinked iteratively; the default recursive drop
// overflows the stack on long queues.
fn drop_chain<T>(mut head: Option<Box<Node<T>>>) {
    while let Some(mut node) = head {
        head = node.next.take();
    }
}
