//! `SparseGrid`: quadrant-partitioned sparse 2-D array.
//!
//! Layout:
//! - Four quadrants selected by the sign of `(x, y)`. Negative coordinates
//!   are stored at `!c` so every quadrant indexes from zero.
//! - Each quadrant is an [`Axis`] of rows, and each row is an [`Axis`] of
//!   cells. A row is dropped as soon as its last cell is removed.
//! - An `Axis` is a bitmap trie: a directory of 2^18-slot blocks, each block
//!   two 64-way branch levels over 64-slot leaves. Every level keeps one
//!   occupancy word, so storage follows the occupied slots rather than the
//!   magnitude of the coordinates.
//! - Allocated leaves and branches are kept after removal and only released
//!   by [`SparseGrid::clear`].
//!
//! Directional probes descend the occupancy words (64 slots per test), so a
//! probe across empty space costs a handful of word loads rather than one
//! test per coordinate.

use super::cell::Position;
use super::direction::Direction;

pub const PAGE_CELLS: usize = 64;
pub const DEFAULT_GROWTH_STEP: usize = 256;

const BLOCK_SHIFT: u32 = 18;
const BLOCK_SLOTS: usize = 1 << BLOCK_SHIFT;
const BLOCK_MASK: usize = BLOCK_SLOTS - 1;

/// Occupancy bits strictly above `bit`.
#[inline(always)]
fn bits_above(bit: usize) -> u64 {
    u64::MAX.checked_shl(bit as u32 + 1).unwrap_or(0)
}

/// Occupancy bits strictly below `bit`.
#[inline(always)]
fn bits_below(bit: usize) -> u64 {
    (1u64 << bit) - 1
}

/// One level of the bitmap trie. Indices are local to the node.
trait Node {
    type Value;
    /// log2 of the slots the node spans.
    const SHIFT: u32;

    fn new() -> Self;
    fn is_empty(&self) -> bool;
    fn get(&self, i: usize) -> Option<&Self::Value>;
    fn get_mut(&mut self, i: usize) -> Option<&mut Self::Value>;
    fn insert(&mut self, i: usize, value: Self::Value) -> Option<Self::Value>;
    fn get_or_insert_with<F: FnOnce() -> Self::Value>(&mut self, i: usize, f: F) -> &mut Self::Value;
    fn remove(&mut self, i: usize) -> Option<Self::Value>;
    /// First occupied index `>= from`.
    fn next(&self, from: usize) -> Option<usize>;
    /// Last occupied index `<= from`.
    fn prev(&self, from: usize) -> Option<usize>;
    fn visit<'a>(&'a self, base: usize, f: &mut dyn FnMut(usize, &'a Self::Value));
}

struct Leaf<V> {
    slots: [Option<V>; PAGE_CELLS],
    mask: u64,
}

impl<V> Node for Leaf<V> {
    type Value = V;
    const SHIFT: u32 = 6;

    fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
            mask: 0,
        }
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.mask == 0
    }

    #[inline]
    fn get(&self, i: usize) -> Option<&V> {
        self.slots[i].as_ref()
    }

    #[inline]
    fn get_mut(&mut self, i: usize) -> Option<&mut V> {
        self.slots[i].as_mut()
    }

    fn insert(&mut self, i: usize, value: V) -> Option<V> {
        self.mask |= 1 << i;
        self.slots[i].replace(value)
    }

    fn get_or_insert_with<F: FnOnce() -> V>(&mut self, i: usize, f: F) -> &mut V {
        self.mask |= 1 << i;
        self.slots[i].get_or_insert_with(f)
    }

    fn remove(&mut self, i: usize) -> Option<V> {
        self.mask &= !(1 << i);
        self.slots[i].take()
    }

    #[inline]
    fn next(&self, from: usize) -> Option<usize> {
        let bits = self.mask & (u64::MAX << from);
        (bits != 0).then(|| bits.trailing_zeros() as usize)
    }

    #[inline]
    fn prev(&self, from: usize) -> Option<usize> {
        let bits = self.mask & (u64::MAX >> (63 - from));
        (bits != 0).then(|| 63 - bits.leading_zeros() as usize)
    }

    fn visit<'a>(&'a self, base: usize, f: &mut dyn FnMut(usize, &'a V)) {
        let mut bits = self.mask;
        while bits != 0 {
            let i = bits.trailing_zeros() as usize;
            bits &= bits - 1;
            if let Some(value) = self.slots[i].as_ref() {
                f(base + i, value);
            }
        }
    }
}

struct Branch<N> {
    children: [Option<Box<N>>; 64],
    /// Bit `c` set while child `c` holds at least one slot.
    mask: u64,
}

impl<N> Branch<N> {
    #[inline]
    fn child(&self, c: usize) -> Option<&N> {
        if self.mask & (1 << c) == 0 {
            return None;
        }
        self.children[c].as_deref()
    }
}

impl<N: Node> Node for Branch<N> {
    type Value = N::Value;
    const SHIFT: u32 = N::SHIFT + 6;

    fn new() -> Self {
        Self {
            children: std::array::from_fn(|_| None),
            mask: 0,
        }
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.mask == 0
    }

    #[inline]
    fn get(&self, i: usize) -> Option<&N::Value> {
        self.children[i >> N::SHIFT].as_deref()?.get(i & ((1 << N::SHIFT) - 1))
    }

    #[inline]
    fn get_mut(&mut self, i: usize) -> Option<&mut N::Value> {
        self.children[i >> N::SHIFT].as_deref_mut()?.get_mut(i & ((1 << N::SHIFT) - 1))
    }

    fn insert(&mut self, i: usize, value: N::Value) -> Option<N::Value> {
        let c = i >> N::SHIFT;
        self.mask |= 1 << c;
        let child = self.children[c].get_or_insert_with(|| Box::new(N::new()));
        child.insert(i & ((1 << N::SHIFT) - 1), value)
    }

    fn get_or_insert_with<F: FnOnce() -> N::Value>(&mut self, i: usize, f: F) -> &mut N::Value {
        let c = i >> N::SHIFT;
        self.mask |= 1 << c;
        let child = self.children[c].get_or_insert_with(|| Box::new(N::new()));
        child.get_or_insert_with(i & ((1 << N::SHIFT) - 1), f)
    }

    fn remove(&mut self, i: usize) -> Option<N::Value> {
        let c = i >> N::SHIFT;
        let child = self.children[c].as_deref_mut()?;
        let removed = child.remove(i & ((1 << N::SHIFT) - 1));
        if child.is_empty() {
            self.mask &= !(1 << c);
        }
        removed
    }

    fn next(&self, from: usize) -> Option<usize> {
        let c = from >> N::SHIFT;
        if let Some(child) = self.child(c)
            && let Some(i) = child.next(from & ((1 << N::SHIFT) - 1))
        {
            return Some((c << N::SHIFT) + i);
        }
        let later = self.mask & bits_above(c);
        if later == 0 {
            return None;
        }
        let c = later.trailing_zeros() as usize;
        self.child(c)?.next(0).map(|i| (c << N::SHIFT) + i)
    }

    fn prev(&self, from: usize) -> Option<usize> {
        let c = from >> N::SHIFT;
        if let Some(child) = self.child(c)
            && let Some(i) = child.prev(from & ((1 << N::SHIFT) - 1))
        {
            return Some((c << N::SHIFT) + i);
        }
        let earlier = self.mask & bits_below(c);
        if earlier == 0 {
            return None;
        }
        let c = 63 - earlier.leading_zeros() as usize;
        self.child(c)?.prev((1 << N::SHIFT) - 1).map(|i| (c << N::SHIFT) + i)
    }

    fn visit<'a>(&'a self, base: usize, f: &mut dyn FnMut(usize, &'a N::Value)) {
        let mut bits = self.mask;
        while bits != 0 {
            let c = bits.trailing_zeros() as usize;
            bits &= bits - 1;
            if let Some(child) = self.children[c].as_deref() {
                child.visit(base + (c << N::SHIFT), f);
            }
        }
    }
}

type Block<V> = Branch<Branch<Leaf<V>>>;

/// Sparse vector over one non-negative axis.
struct Axis<V> {
    blocks: Vec<Option<Box<Block<V>>>>,
    /// Bit `b` set while block `b` holds at least one slot.
    block_bits: Vec<u64>,
    len: usize,
}

impl<V> Axis<V> {
    fn new() -> Self {
        Self {
            blocks: Vec::new(),
            block_bits: Vec::new(),
            len: 0,
        }
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn block(&self, b: usize) -> Option<&Block<V>> {
        self.blocks.get(b)?.as_deref()
    }

    #[inline]
    fn get(&self, i: usize) -> Option<&V> {
        self.block(i >> BLOCK_SHIFT)?.get(i & BLOCK_MASK)
    }

    #[inline]
    fn get_mut(&mut self, i: usize) -> Option<&mut V> {
        self.blocks.get_mut(i >> BLOCK_SHIFT)?.as_deref_mut()?.get_mut(i & BLOCK_MASK)
    }

    #[inline]
    fn contains(&self, i: usize) -> bool {
        self.get(i).is_some()
    }

    /// Directory slot for `i`, growing the directory in `step` cells.
    fn block_mut(&mut self, i: usize, step: usize) -> &mut Block<V> {
        let b = i >> BLOCK_SHIFT;
        if b >= self.blocks.len() {
            let target = (i + 1).next_multiple_of(step).div_ceil(BLOCK_SLOTS).max(b + 1);
            self.blocks.resize_with(target, || None);
            self.block_bits.resize(target.div_ceil(64), 0);
        }
        self.block_bits[b >> 6] |= 1 << (b & 63);
        self.blocks[b].get_or_insert_with(|| Box::new(Block::<V>::new()))
    }

    fn insert(&mut self, i: usize, value: V, step: usize) -> Option<V> {
        let previous = self.block_mut(i, step).insert(i & BLOCK_MASK, value);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    fn get_or_insert_with<F: FnOnce() -> V>(&mut self, i: usize, step: usize, f: F) -> &mut V {
        if !self.contains(i) {
            self.len += 1;
        }
        self.block_mut(i, step).get_or_insert_with(i & BLOCK_MASK, f)
    }

    fn remove(&mut self, i: usize) -> Option<V> {
        let b = i >> BLOCK_SHIFT;
        let block = self.blocks.get_mut(b)?.as_deref_mut()?;
        let removed = block.remove(i & BLOCK_MASK)?;
        if block.is_empty() {
            self.block_bits[b >> 6] &= !(1 << (b & 63));
        }
        self.len -= 1;
        Some(removed)
    }

    /// First occupied index `>= from`.
    fn next(&self, from: usize) -> Option<usize> {
        let b = from >> BLOCK_SHIFT;
        if let Some(block) = self.block(b)
            && let Some(i) = block.next(from & BLOCK_MASK)
        {
            return Some((b << BLOCK_SHIFT) + i);
        }
        let b = next_set_bit(&self.block_bits, b + 1)?;
        self.block(b)?.next(0).map(|i| (b << BLOCK_SHIFT) + i)
    }

    /// Last occupied index `<= from`.
    fn prev(&self, from: usize) -> Option<usize> {
        let b = from >> BLOCK_SHIFT;
        if let Some(block) = self.block(b)
            && let Some(i) = block.prev(from & BLOCK_MASK)
        {
            return Some((b << BLOCK_SHIFT) + i);
        }
        let b = prev_set_bit(&self.block_bits, b.checked_sub(1)?)?;
        self.block(b)?.prev(BLOCK_MASK).map(|i| (b << BLOCK_SHIFT) + i)
    }

    fn for_each<'a>(&'a self, f: &mut dyn FnMut(usize, &'a V)) {
        for (b, block) in self.blocks.iter().enumerate() {
            if let Some(block) = block.as_deref() {
                block.visit(b << BLOCK_SHIFT, f);
            }
        }
    }
}

/// First set bit at or after `from`.
#[inline]
fn next_set_bit(words: &[u64], from: usize) -> Option<usize> {
    let mut word = from >> 6;
    let mut bits = *words.get(word)? & (u64::MAX << (from & 63));
    loop {
        if bits != 0 {
            return Some((word << 6) + bits.trailing_zeros() as usize);
        }
        word += 1;
        bits = *words.get(word)?;
    }
}

/// Last set bit at or before `from`.
#[inline]
fn prev_set_bit(words: &[u64], from: usize) -> Option<usize> {
    if words.is_empty() {
        return None;
    }
    let mut word = from >> 6;
    let mut bits = if word >= words.len() {
        word = words.len() - 1;
        words[word]
    } else {
        words[word] & (u64::MAX >> (63 - (from & 63)))
    };
    loop {
        if bits != 0 {
            return Some((word << 6) + 63 - bits.leading_zeros() as usize);
        }
        if word == 0 {
            return None;
        }
        word -= 1;
        bits = words[word];
    }
}

/// Quadrant index and local (non-negative) offset of one axis value.
#[inline(always)]
fn split(c: i32) -> (bool, usize) {
    if c < 0 { (true, !c as usize) } else { (false, c as usize) }
}

#[inline(always)]
fn join(negative: bool, local: usize) -> i32 {
    if negative { !(local as i32) } else { local as i32 }
}

#[inline(always)]
fn quadrant_of(neg_x: bool, neg_y: bool) -> usize {
    ((neg_y as usize) << 1) | neg_x as usize
}

type Row<T> = Axis<T>;
type Quadrant<T> = Axis<Row<T>>;

/// One half of an axis line (a row or a column restricted to one sign).
trait HalfLine {
    /// Nearest occupied local index `>= from`.
    fn next(&self, from: usize) -> Option<usize>;
    /// Nearest occupied local index `<= from`.
    fn prev(&self, from: usize) -> Option<usize>;
}

struct RowHalf<'a, T>(Option<&'a Row<T>>);

impl<T> HalfLine for RowHalf<'_, T> {
    fn next(&self, from: usize) -> Option<usize> {
        self.0?.next(from)
    }

    fn prev(&self, from: usize) -> Option<usize> {
        self.0?.prev(from)
    }
}

/// Visits only non-empty rows; empty rows are never stored.
struct ColumnHalf<'a, T> {
    rows: &'a Quadrant<T>,
    lx: usize,
}

impl<T> HalfLine for ColumnHalf<'_, T> {
    fn next(&self, from: usize) -> Option<usize> {
        let mut ly = from;
        while let Some(row) = self.rows.next(ly) {
            if self.rows.get(row).is_some_and(|r| r.contains(self.lx)) {
                return Some(row);
            }
            ly = row + 1;
        }
        None
    }

    fn prev(&self, from: usize) -> Option<usize> {
        let mut ly = from;
        while let Some(row) = self.rows.prev(ly) {
            if self.rows.get(row).is_some_and(|r| r.contains(self.lx)) {
                return Some(row);
            }
            ly = row.checked_sub(1)?;
        }
        None
    }
}

/// Nearest occupied coordinate strictly past `c` along one axis.
fn walk_line(c: i32, forward: bool, pos: &impl HalfLine, neg: &impl HalfLine) -> Option<i32> {
    let (negative, local) = split(c);
    match (forward, negative) {
        // Towards +inf from the positive half: local indices grow.
        (true, false) => pos.next(local + 1).map(|l| join(false, l)),
        // Towards +inf from the negative half: local indices shrink to 0,
        // then continue in the positive half.
        (true, true) => local
            .checked_sub(1)
            .and_then(|from| neg.prev(from))
            .map(|l| join(true, l))
            .or_else(|| pos.next(0).map(|l| join(false, l))),
        (false, true) => neg.next(local + 1).map(|l| join(true, l)),
        (false, false) => local
            .checked_sub(1)
            .and_then(|from| pos.prev(from))
            .map(|l| join(false, l))
            .or_else(|| neg.next(0).map(|l| join(true, l))),
    }
}

/// Sparse map from `(x, y)` to `T` over the whole `i32` plane.
pub struct SparseGrid<T> {
    quadrants: [Quadrant<T>; 4],
    len: usize,
    growth_step: usize,
}

impl<T> Default for SparseGrid<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SparseGrid<T> {
    pub fn new() -> Self {
        Self::with_growth_step(DEFAULT_GROWTH_STEP)
    }

    /// Directory growth in cells; `step` is rounded up to whole pages.
    pub fn with_growth_step(step: usize) -> Self {
        Self {
            quadrants: std::array::from_fn(|_| Axis::new()),
            len: 0,
            growth_step: step.max(1).next_multiple_of(PAGE_CELLS),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn locate(x: i32, y: i32) -> (usize, usize, usize) {
        let (neg_x, lx) = split(x);
        let (neg_y, ly) = split(y);
        (quadrant_of(neg_x, neg_y), lx, ly)
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32) -> Option<&T> {
        let (q, lx, ly) = Self::locate(x, y);
        self.quadrants[q].get(ly)?.get(lx)
    }

    #[inline]
    pub fn get_mut(&mut self, x: i32, y: i32) -> Option<&mut T> {
        let (q, lx, ly) = Self::locate(x, y);
        self.quadrants[q].get_mut(ly)?.get_mut(lx)
    }

    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.get(x, y).is_some()
    }

    /// Insert or replace. Returns the previous value.
    pub fn set(&mut self, x: i32, y: i32, value: T) -> Option<T> {
        let (q, lx, ly) = Self::locate(x, y);
        let step = self.growth_step;
        let row = self.quadrants[q].get_or_insert_with(ly, step, Axis::new);
        let previous = row.insert(lx, value, step);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    pub fn remove(&mut self, x: i32, y: i32) -> Option<T> {
        let (q, lx, ly) = Self::locate(x, y);
        let quadrant = &mut self.quadrants[q];
        let row = quadrant.get_mut(ly)?;
        let removed = row.remove(lx)?;
        if row.is_empty() {
            quadrant.remove(ly);
        }
        self.len -= 1;
        Some(removed)
    }

    /// Nearest populated cell strictly past `(x, y)` in `dir`.
    ///
    /// Bootstrap probe only; the engine answers per-beam queries from its
    /// neighbor links instead.
    pub fn nearest_in_direction(&self, x: i32, y: i32, dir: Direction) -> Option<Position> {
        let forward = matches!(dir, Direction::Right | Direction::Down);
        if dir.is_horizontal() {
            let (neg_y, ly) = split(y);
            let pos = RowHalf(self.quadrants[quadrant_of(false, neg_y)].get(ly));
            let neg = RowHalf(self.quadrants[quadrant_of(true, neg_y)].get(ly));
            walk_line(x, forward, &pos, &neg).map(|nx| Position::new(nx, y))
        } else {
            let (neg_x, lx) = split(x);
            let pos = ColumnHalf {
                rows: &self.quadrants[quadrant_of(neg_x, false)],
                lx,
            };
            let neg = ColumnHalf {
                rows: &self.quadrants[quadrant_of(neg_x, true)],
                lx,
            };
            walk_line(y, forward, &pos, &neg).map(|ny| Position::new(x, ny))
        }
    }

    /// True when no populated cell lies strictly past `(x, y)` in `dir`.
    #[inline]
    pub fn is_empty_in_direction(&self, x: i32, y: i32, dir: Direction) -> bool {
        self.nearest_in_direction(x, y, dir).is_none()
    }

    /// Populated cells in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (Position, &T)> + '_ {
        let mut cells = Vec::with_capacity(self.len);
        self.visit(&mut |pos, value| cells.push((pos, value)));
        cells.into_iter()
    }

    pub fn for_each<F: FnMut(Position, &T)>(&self, mut f: F) {
        self.visit(&mut |pos, value| f(pos, value));
    }

    fn visit<'a>(&'a self, f: &mut dyn FnMut(Position, &'a T)) {
        for (q, quadrant) in self.quadrants.iter().enumerate() {
            let (neg_x, neg_y) = (q & 1 == 1, q & 2 == 2);
            quadrant.for_each(&mut |ly, row: &'a Row<T>| {
                let y = join(neg_y, ly);
                row.for_each(&mut |lx, value| f(Position::new(join(neg_x, lx), y), value));
            });
        }
    }

    /// Inclusive `(min_x, min_y, max_x, max_y)` of populated cells.
    pub fn bounds(&self) -> Option<(i32, i32, i32, i32)> {
        let mut min_x = i32::MAX;
        let mut min_y = i32::MAX;
        let mut max_x = i32::MIN;
        let mut max_y = i32::MIN;
        let mut seen = false;

        self.for_each(|pos, _| {
            seen = true;
            min_x = min_x.min(pos.x);
            min_y = min_y.min(pos.y);
            max_x = max_x.max(pos.x);
            max_y = max_y.max(pos.y);
        });

        seen.then_some((min_x, min_y, max_x, max_y))
    }

    /// Drop all cells and release the backing storage.
    pub fn clear(&mut self) {
        self.quadrants = std::array::from_fn(|_| Axis::new());
        self.len = 0;
    }
}
