//! Cardinal directions and the placement-frame transforms.
//!
//! Ordinals run clockwise in screen coordinates: `Right` is `+x`, `Down` is
//! `+y`. Adding a direction rotates by that many quarter turns.

/// One of the four beam travel directions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Direction {
    #[default]
    Right = 0, // (x+1, y)
    Down  = 1, // (x, y+1)
    Left  = 2, // (x-1, y)
    Up    = 3, // (x, y-1)
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Right,
        Direction::Down,
        Direction::Left,
        Direction::Up,
    ];

    #[inline]
    pub const fn from_index(index: usize) -> Direction {
        match index & 3 {
            0 => Direction::Right,
            1 => Direction::Down,
            2 => Direction::Left,
            _ => Direction::Up,
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Unit step for this direction.
    #[inline]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Direction::Right => (1, 0),
            Direction::Down  => (0, 1),
            Direction::Left  => (-1, 0),
            Direction::Up    => (0, -1),
        }
    }

    /// The direction pointing back (for bidirectional linking).
    #[inline]
    pub const fn opposite(self) -> Direction {
        Direction::from_index(self.index() + 2)
    }

    #[inline]
    pub const fn is_horizontal(self) -> bool {
        matches!(self, Direction::Right | Direction::Left)
    }

    /// `(self + other) mod 4`.
    #[inline]
    pub const fn add(self, other: Direction) -> Direction {
        Direction::from_index(self.index() + other.index())
    }

    /// `(self - other) mod 4`.
    #[inline]
    pub const fn sub(self, other: Direction) -> Direction {
        Direction::from_index(self.index() + 4 - other.index())
    }

    /// Sprite-flip convention: a flipped placement swaps `Up` and `Down` and
    /// leaves `Right`/`Left` alone. This is not a geometric reflection.
    #[inline]
    pub const fn apply_flip(self, flipped: bool) -> Direction {
        if !flipped {
            return self;
        }
        match self {
            Direction::Down => Direction::Up,
            Direction::Up => Direction::Down,
            other => other,
        }
    }

    /// Local (component-frame) direction to absolute grid direction.
    #[inline]
    pub const fn to_absolute(self, orientation: Direction, flipped: bool) -> Direction {
        self.apply_flip(flipped).add(orientation)
    }

    /// Absolute grid direction to a component's local frame.
    #[inline]
    pub const fn to_local(self, orientation: Direction, flipped: bool) -> Direction {
        self.sub(orientation).apply_flip(flipped)
    }
}
