//! `NeighborIndex`: nearest occupied neighbor in each cardinal direction.
//!
//! Every occupied cell owns a pooled `LinkCell` holding four handles, one per
//! `Direction`. Along each row and column the cells form a doubly linked
//! chain: `a.links[Right] == b` implies `b.links[Left] == a`. A `None` link
//! means the side is open to infinity.
//!
//! Insertion pays a one-time bootstrap probe on the backing `SparseGrid`
//! (at most one per axis) and then splices into the existing chain.
//! Removal reconnects the two neighbors on each axis directly.

use thiserror::Error;

use super::cell::Position;
use super::direction::Direction;
use super::pool::{ObjectPool, PoolIdx};
use super::sparse::SparseGrid;

/// Neighbor handles for one occupied cell. Indexed by `Direction`.
#[derive(Clone, Copy, Debug)]
pub struct LinkCell {
    pub pos: Position,
    pub links: [Option<PoolIdx>; 4],
}

impl LinkCell {
    fn new(pos: Position) -> Self {
        Self {
            pos,
            links: [None; 4],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("{from:?} links {dir:?} to {to:?}, which does not link back")]
    Asymmetric {
        from: Position,
        dir: Direction,
        to: Position,
    },
    #[error("{from:?} links {dir:?} to {to:?}, but the nearest occupied cell is {expected:?}")]
    NotNearest {
        from: Position,
        dir: Direction,
        to: Option<Position>,
        expected: Option<Position>,
    },
    #[error("{0:?} has a stale link handle")]
    Dangling(Position),
    #[error("placement at {0:?} has no link record")]
    MissingRecord(Position),
    #[error("{placements} placements but {records} link records")]
    CountMismatch { placements: usize, records: usize },
}

pub struct NeighborIndex {
    cells: SparseGrid<PoolIdx>,
    links: ObjectPool<LinkCell>,
}

impl Default for NeighborIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl NeighborIndex {
    pub fn new() -> Self {
        Self::with_storage(super::sparse::DEFAULT_GROWTH_STEP, 0)
    }

    pub fn with_storage(growth_step: usize, capacity: usize) -> Self {
        Self {
            cells: SparseGrid::with_growth_step(growth_step),
            links: ObjectPool::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    #[inline]
    pub fn has_record(&self, x: i32, y: i32) -> bool {
        self.cells.contains(x, y)
    }

    #[inline]
    fn pos_of(&self, idx: PoolIdx) -> Option<Position> {
        self.links.get(idx).map(|cell| cell.pos)
    }

    /// Nearest occupied cell from `(x, y)` towards `dir`; `None` means open to
    /// infinity (or no record at `(x, y)`).
    #[inline]
    pub fn neighbor(&self, x: i32, y: i32, dir: Direction) -> Option<Position> {
        let idx = *self.cells.get(x, y)?;
        let next = self.links.get(idx)?.links[dir.index()]?;
        self.pos_of(next)
    }

    /// All four neighbors of an occupied cell, indexed by `Direction`.
    pub fn links(&self, x: i32, y: i32) -> Option<[Option<Position>; 4]> {
        let idx = *self.cells.get(x, y)?;
        let cell = self.links.get(idx)?;
        Some(cell.links.map(|link| link.and_then(|l| self.pos_of(l))))
    }

    /// Register an occupied cell and splice it into its row and column.
    ///
    /// Returns `false` if `(x, y)` already had a record.
    pub fn insert(&mut self, x: i32, y: i32) -> bool {
        debug_assert!(
            !self.cells.contains(x, y),
            "NeighborIndex::insert called twice for ({x},{y})"
        );
        if self.cells.contains(x, y) {
            return false;
        }

        // Probe before the new cell is visible so the scan cannot find itself.
        let right = self.bootstrap(x, y, Direction::Right);
        let left = match right {
            Some(r) => self.links.get(r).and_then(|c| c.links[Direction::Left.index()]),
            None => self.bootstrap(x, y, Direction::Left),
        };
        let down = self.bootstrap(x, y, Direction::Down);
        let up = match down {
            Some(d) => self.links.get(d).and_then(|c| c.links[Direction::Up.index()]),
            None => self.bootstrap(x, y, Direction::Up),
        };

        let idx = self.links.acquire(LinkCell::new(Position::new(x, y)));
        self.cells.set(x, y, idx);
        self.splice(idx, Direction::Left, left, right);
        self.splice(idx, Direction::Up, up, down);
        true
    }

    /// Unlink `(x, y)` and reconnect its neighbors to each other.
    ///
    /// Returns `false` when there was no record.
    pub fn remove(&mut self, x: i32, y: i32) -> bool {
        let Some(idx) = self.cells.remove(x, y) else {
            return false;
        };
        let released = self.links.release(idx);
        debug_assert!(
            released.is_some(),
            "grid entry at ({x},{y}) pointed at a free link slot"
        );
        let Some(cell) = released else {
            return false;
        };
        self.join(cell.links[Direction::Left.index()], Direction::Right, cell.links[Direction::Right.index()]);
        self.join(cell.links[Direction::Up.index()], Direction::Down, cell.links[Direction::Down.index()]);
        true
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.cells.clear();
        self.links.clear();
    }

    #[inline]
    fn bootstrap(&self, x: i32, y: i32, dir: Direction) -> Option<PoolIdx> {
        let found = self.cells.nearest_in_direction(x, y, dir)?;
        self.cells.get(found.x, found.y).copied()
    }

    /// Place `idx` between `before` (towards `back`) and `after` (the
    /// opposite way) on one axis. All four link writes happen here.
    fn splice(&mut self, idx: PoolIdx, back: Direction, before: Option<PoolIdx>, after: Option<PoolIdx>) {
        let fwd = back.opposite();
        if let Some(cell) = self.links.get_mut(idx) {
            cell.links[back.index()] = before;
            cell.links[fwd.index()] = after;
        }
        if let Some(b) = before.and_then(|b| self.links.get_mut(b)) {
            debug_assert_eq!(b.links[fwd.index()], after, "splice target was not adjacent");
            b.links[fwd.index()] = Some(idx);
        }
        if let Some(a) = after.and_then(|a| self.links.get_mut(a)) {
            debug_assert_eq!(a.links[back.index()], before, "splice target was not adjacent");
            a.links[back.index()] = Some(idx);
        }
    }

    /// Make `a` and `b` adjacent along `dir` (`a` before `b`).
    fn join(&mut self, a: Option<PoolIdx>, dir: Direction, b: Option<PoolIdx>) {
        if let Some(cell) = a.and_then(|a| self.links.get_mut(a)) {
            cell.links[dir.index()] = b;
        }
        if let Some(cell) = b.and_then(|b| self.links.get_mut(b)) {
            cell.links[dir.opposite().index()] = a;
        }
    }

    /// Verify every link is mutual and points at the nearest occupied cell.
    pub fn check_symmetry(&self) -> Result<(), LinkError> {
        for (_, cell) in self.links.iter() {
            let from = cell.pos;
            for dir in Direction::ALL {
                let to = match cell.links[dir.index()] {
                    Some(l) => Some(self.pos_of(l).ok_or(LinkError::Dangling(from))?),
                    None => None,
                };
                let expected = self.cells.nearest_in_direction(from.x, from.y, dir);
                if to != expected {
                    return Err(LinkError::NotNearest {
                        from,
                        dir,
                        to,
                        expected,
                    });
                }
                if let Some(to) = to
                    && self.neighbor(to.x, to.y, dir.opposite()) != Some(from)
                {
                    return Err(LinkError::Asymmetric { from, dir, to });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Direction, NeighborIndex, Position};

    fn p(x: i32, y: i32) -> Option<Position> {
        Some(Position::new(x, y))
    }

    #[test]
    fn splice_between_existing_pair() {
        let mut index = NeighborIndex::new();
        index.insert(0, 0);
        index.insert(10, 0);
        assert_eq!(index.neighbor(0, 0, Direction::Right), p(10, 0));

        index.insert(5, 0);
        assert_eq!(index.neighbor(0, 0, Direction::Right), p(5, 0));
        assert_eq!(index.neighbor(10, 0, Direction::Left), p(5, 0));
        assert_eq!(index.neighbor(5, 0, Direction::Left), p(0, 0));
        assert_eq!(index.neighbor(5, 0, Direction::Right), p(10, 0));
        assert_eq!(index.neighbor(5, 0, Direction::Up), None);
        index.check_symmetry().unwrap();
    }

    #[test]
    fn remove_relinks_or_opens() {
        let mut index = NeighborIndex::new();
        for &(x, y) in &[(5, 5), (2, 5), (9, 5), (5, 0), (5, 6)] {
            index.insert(x, y);
        }
        assert!(index.remove(5, 5));
        assert!(!index.has_record(5, 5));
        assert_eq!(index.neighbor(2, 5, Direction::Right), p(9, 5));
        assert_eq!(index.neighbor(9, 5, Direction::Left), p(2, 5));
        assert_eq!(index.neighbor(5, 0, Direction::Down), p(5, 6));
        assert_eq!(index.neighbor(5, 6, Direction::Up), p(5, 0));

        assert!(index.remove(5, 6));
        assert_eq!(index.neighbor(5, 0, Direction::Down), None);
        assert!(!index.remove(5, 6));
        index.check_symmetry().unwrap();
    }

    #[test]
    fn link_cells_are_recycled() {
        let mut index = NeighborIndex::new();
        index.insert(1, 1);
        index.insert(2, 1);
        index.remove(1, 1);
        index.insert(-4, 1);
        assert_eq!(index.links.capacity(), 2);
        assert_eq!(index.neighbor(-4, 1, Direction::Right), p(2, 1));
    }

    #[test]
    fn links_report_all_sides() {
        let mut index = NeighborIndex::new();
        index.insert(0, 0);
        index.insert(0, -3);
        index.insert(-8, 0);
        assert_eq!(
            index.links(0, 0),
            Some([None, None, p(-8, 0), p(0, -3)])
        );
        assert_eq!(index.links(1, 1), None);
    }
}
