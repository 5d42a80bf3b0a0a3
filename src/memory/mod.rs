// ── Growable storage ────────────────────────────────────────────────
//
// Every buffer in the VM (chunk code, line table, constant pool, operand
// stack) is a GrowableBuffer, so the growth rule lives here and nowhere else.

/// Smallest non-zero capacity a buffer grows to.
pub const MIN_CAPACITY: usize = 8;

/// Capacity a full buffer grows to: 8 from anything below 8, otherwise double.
#[inline]
pub fn grow_capacity(capacity: usize) -> usize {
    if capacity < MIN_CAPACITY { MIN_CAPACITY } else { capacity * 2 }
}

/// The one place storage is resized.
///
/// A `new_capacity` of zero releases the allocation. Running out of memory is
/// not recoverable for the VM: the failure is logged and the process exits.
pub fn reallocate<T>(buf: &mut Vec<T>, new_capacity: usize) {
    if new_capacity == 0 {
        *buf = Vec::new();
        return;
    }

    if new_capacity > buf.len() {
        let additional = new_capacity - buf.len();
        if let Err(e) = buf.try_reserve_exact(additional) {
            log::error!("allocation of {} slots failed: {}", new_capacity, e);
            eprintln!("fatal: out of memory");
            std::process::exit(1);
        }
    }
}

/// Append-only sequence with an explicit logical capacity.
///
/// `len` and `capacity` are tracked independently; capacity only changes
/// through `grow_capacity` on a full push, or through `free`.
#[derive(Debug, Clone, PartialEq)]
pub struct GrowableBuffer<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T> GrowableBuffer<T> {
    pub fn new() -> Self {
        GrowableBuffer { items: Vec::new(), capacity: 0 }
    }

    pub fn push(&mut self, item: T) {
        if self.items.len() + 1 > self.capacity {
            let old = self.capacity;
            self.capacity = grow_capacity(old);
            log::trace!("growing buffer {} -> {}", old, self.capacity);
            reallocate(&mut self.items, self.capacity);
        }
        self.items.push(item);
    }

    /// Removes the last item. Capacity is left untouched.
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    #[inline]
    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Drops every item but keeps the capacity for reuse.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Releases the storage. The buffer is empty with capacity 0 afterwards.
    pub fn free(&mut self) {
        reallocate(&mut self.items, 0);
        self.capacity = 0;
    }
}

impl<T> Default for GrowableBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::ops::Index<usize> for GrowableBuffer<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<'a, T> IntoIterator for &'a GrowableBuffer<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grow_from_zero_is_eight() {
        assert_eq!(grow_capacity(0), 8);
    }

    #[test]
    fn grow_small_capacities_to_eight() {
        for c in 1..8 {
            assert_eq!(grow_capacity(c), 8, "capacity {c}");
        }
    }

    #[test]
    fn grow_doubles_from_eight() {
        assert_eq!(grow_capacity(8), 16);
        assert_eq!(grow_capacity(16), 32);
        assert_eq!(grow_capacity(1024), 2048);
    }

    #[test]
    fn new_buffer_has_no_capacity() {
        let buf: GrowableBuffer<u8> = GrowableBuffer::new();
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.capacity(), 0);
        assert!(buf.is_empty());
    }

    #[test]
    fn first_push_allocates_eight() {
        let mut buf = GrowableBuffer::new();
        buf.push(1u8);
        assert_eq!(buf.capacity(), 8);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn ninth_push_doubles() {
        let mut buf = GrowableBuffer::new();
        for i in 0..8u8 {
            buf.push(i);
        }
        assert_eq!(buf.capacity(), 8);
        buf.push(8);
        assert_eq!(buf.capacity(), 16);
        assert_eq!(buf.as_slice(), &[0, 1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut buf = GrowableBuffer::new();
        for i in 0..10 {
            buf.push(i);
        }
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 16);
    }

    #[test]
    fn free_releases_everything() {
        let mut buf = GrowableBuffer::new();
        buf.push(1.5f64);
        buf.free();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 0);
        buf.push(2.5);
        assert_eq!(buf.capacity(), 8);
        assert_eq!(buf[0], 2.5);
    }

    #[test]
    fn pop_and_last() {
        let mut buf = GrowableBuffer::new();
        buf.push('a');
        buf.push('b');
        assert_eq!(buf.last(), Some(&'b'));
        assert_eq!(buf.pop(), Some('b'));
        assert_eq!(buf.pop(), Some('a'));
        assert_eq!(buf.pop(), None);
        assert_eq!(buf.capacity(), 8);
    }

    #[test]
    fn reallocate_zero_releases() {
        let mut v = vec![1, 2, 3];
        reallocate(&mut v, 0);
        assert!(v.is_empty());
        assert_eq!(v.capacity(), 0);
    }

    #[test]
    fn reallocate_reserves_at_least_requested() {
        let mut v: Vec<u32> = Vec::new();
        reallocate(&mut v, 32);
        assert!(v.capacity() >= 32);
    }
}
