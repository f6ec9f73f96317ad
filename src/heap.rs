//! Binary min-heap used as the A* open set.

/// Array-backed binary heap that pops the smallest element first.
///
/// Equal elements come out in an order decided by the heap layout, not insertion order.
#[derive(Debug, Clone)]
pub(crate) struct MinHeap<T> {
    items: Vec<T>,
}

impl<T: Ord> MinHeap<T> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        MinHeap {
            items: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn push(&mut self, item: T) {
        self.items.push(item);
        self.sift_up(self.items.len() - 1);
    }

    pub(crate) fn pop(&mut self) -> Option<T> {
        if self.items.is_empty() {
            return None;
        }

        let last = self.items.len() - 1;
        self.items.swap(0, last);
        let item = self.items.pop();

        if !self.items.is_empty() {
            self.sift_down(0);
        }

        item
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if self.items[index] >= self.items[parent] {
                break;
            }
            self.items.swap(index, parent);
            index = parent;
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        let len = self.items.len();

        loop {
            let left = 2 * index + 1;
            let right = left + 1;
            let mut smallest = index;

            if left < len && self.items[left] < self.items[smallest] {
                smallest = left;
            }
            if right < len && self.items[right] < self.items[smallest] {
                smallest = right;
            }
            if smallest == index {
                break;
            }

            self.items.swap(index, smallest);
            index = smallest;
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;

    #[test]
    fn test_pops_in_ascending_order() {
        let mut heap = MinHeap::with_capacity(8);
        for value in [5, 1, 8, 3, 9, 2, 7] {
            heap.push(value);
        }

        assert_eq!(heap.len(), 7);

        let mut popped = Vec::new();
        while let Some(value) = heap.pop() {
            popped.push(value);
        }

        assert_eq!(popped, vec![1, 2, 3, 5, 7, 8, 9]);
        assert_eq!(heap.len(), 0);
        assert_eq!(heap.pop(), None);
    }

    #[test]
    fn test_interleaved_push_pop() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut heap = MinHeap::with_capacity(0);
        let mut reference = Vec::new();

        for _ in 0..500 {
            if rng.random_bool(0.6) {
                let value: u32 = rng.random_range(0..100);
                heap.push(value);
                reference.push(value);
            } else {
                reference.sort_unstable_by(|a, b| b.cmp(a));
                assert_eq!(heap.pop(), reference.pop());
            }
        }
    }
}
