//! Grid coordinates and beam colors.

use super::direction::Direction;

/// Integer grid coordinate.
///
/// `i32::MIN`/`i32::MAX` on either axis are reserved: they stand for "open to
/// infinity" and can never hold a placement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The neighbouring cell in `dir`, or `None` when that would land on a
    /// reserved sentinel coordinate.
    #[inline]
    pub fn step(self, dir: Direction) -> Option<Position> {
        let (dx, dy) = dir.offset();
        let next = Position::new(self.x.checked_add(dx)?, self.y.checked_add(dy)?);
        (!next.is_reserved()).then_some(next)
    }

    /// The sentinel a beam leaving this cell in `dir` reports as its
    /// destination when nothing is in the way.
    #[inline]
    pub const fn infinity(self, dir: Direction) -> Position {
        match dir {
            Direction::Right => Position::new(i32::MAX, self.y),
            Direction::Down => Position::new(self.x, i32::MAX),
            Direction::Left => Position::new(i32::MIN, self.y),
            Direction::Up => Position::new(self.x, i32::MIN),
        }
    }

    /// True when either coordinate is one of the infinity sentinels.
    #[inline]
    pub const fn is_reserved(self) -> bool {
        self.x == i32::MIN || self.x == i32::MAX || self.y == i32::MIN || self.y == i32::MAX
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Position::new(x, y)
    }
}

/// Three non-negative beam channels.
///
/// Construct through [`Color::new`] (or [`Color::clamped`]) so channels are
/// floored to zero; `NaN` counts as zero.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const ZERO: Color = Color { r: 0.0, g: 0.0, b: 0.0 };

    #[inline]
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }.clamped()
    }

    #[inline]
    pub fn clamped(self) -> Self {
        #[inline(always)]
        fn floor(channel: f32) -> f32 {
            // `max` returns the non-NaN operand.
            channel.max(0.0)
        }
        Self {
            r: floor(self.r),
            g: floor(self.g),
            b: floor(self.b),
        }
    }

    /// A zero beam is the same as no beam for delivery purposes.
    #[inline]
    pub fn is_zero(self) -> bool {
        self.r <= 0.0 && self.g <= 0.0 && self.b <= 0.0
    }
}
