use parking_lot::Mutex;

/// FIFO of deferred work shared between many producers and one consumer.
///
/// Producers only ever [`push`](Self::push). The consumer takes the whole
/// backlog at once with [`take`](Self::take); anything pushed after that
/// lands in the next batch.
pub struct TaskQueue<T> {
    items: Mutex<Vec<T>>,
}

impl<T> TaskQueue<T> {
    /// Empty queue.
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    /// Append one item. Safe from any thread.
    pub fn push(&self, item: T) {
        self.items.lock().push(item);
    }

    /// Swap out everything queued so far, in insertion order.
    pub fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.items.lock())
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn take_preserves_order_and_empties() {
        let q = TaskQueue::new();
        q.push(1);
        q.push(2);
        q.push(3);
        assert_eq!(q.take(), vec![1, 2, 3]);
        assert!(q.is_empty());
    }

    #[test]
    fn pushes_after_take_go_to_next_batch() {
        let q = TaskQueue::new();
        q.push("a");
        let first = q.take();
        q.push("b");
        assert_eq!(first, vec!["a"]);
        assert_eq!(q.take(), vec!["b"]);
    }

    #[test]
    fn concurrent_producers_lose_nothing() {
        let q = Arc::new(TaskQueue::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    for i in 0..1000 {
                        q.push((t, i));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let items = q.take();
        assert_eq!(items.len(), 8000);
        // Per-producer submission order survives.
        for t in 0..8 {
            let seq: Vec<_> = items.iter().filter(|(p, _)| *p == t).map(|(_, i)| *i).collect();
            assert_eq!(seq, (0..1000).collect::<Vec<_>>());
        }
    }
}
