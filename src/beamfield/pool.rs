//! Typed free-list arena for short-lived records.
//!
//! Released slots go on a free list and are handed out again before the
//! backing vector grows, so a steady-state tick allocates nothing. Handles
//! are plain indices and stay valid until the slot is released.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PoolIdx(pub u32);

impl PoolIdx {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

const MIN_GROW_SLOTS: usize = 256;

pub struct ObjectPool<T> {
    slots: Vec<Option<T>>,
    free_list: Vec<PoolIdx>,
    live: usize,
}

impl<T> Default for ObjectPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ObjectPool<T> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            slots: Vec::with_capacity(cap),
            free_list: Vec::new(),
            live: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Slots ever allocated, live or free.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn ensure_growth_capacity(&mut self) {
        let len = self.slots.len();
        if len < self.slots.capacity() {
            return;
        }
        self.slots.reserve((len / 2).max(MIN_GROW_SLOTS));
    }

    /// Store `value`, recycling a released slot when one is available.
    pub fn acquire(&mut self, value: T) -> PoolIdx {
        self.live += 1;
        if let Some(recycled) = self.free_list.pop() {
            let slot = &mut self.slots[recycled.index()];
            debug_assert!(slot.is_none(), "free list handed out a live slot");
            *slot = Some(value);
            return recycled;
        }
        self.ensure_growth_capacity();
        let idx = PoolIdx(self.slots.len() as u32);
        self.slots.push(Some(value));
        idx
    }

    /// Take the value out and return the slot to the free list.
    ///
    /// Releasing a slot twice returns `None` the second time.
    pub fn release(&mut self, idx: PoolIdx) -> Option<T> {
        let value = self.slots.get_mut(idx.index())?.take()?;
        self.free_list.push(idx);
        self.live -= 1;
        Some(value)
    }

    #[inline]
    pub fn get(&self, idx: PoolIdx) -> Option<&T> {
        self.slots.get(idx.index())?.as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, idx: PoolIdx) -> Option<&mut T> {
        self.slots.get_mut(idx.index())?.as_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PoolIdx, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (PoolIdx(i as u32), v)))
    }

    /// Drop every value and forget all slots, releasing memory.
    pub fn clear(&mut self) {
        self.slots = Vec::new();
        self.free_list = Vec::new();
        self.live = 0;
    }
}
