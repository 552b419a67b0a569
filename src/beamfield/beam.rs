//! Beam records and in-flight transits.

use super::cell::{Color, Position};
use super::direction::Direction;

/// The current beam leaving `origin` towards `direction`.
///
/// Records persist between ticks (pooled on the field) so a change in color
/// or destination can be detected. A zero color is kept as a record.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Beam {
    pub origin: Position,
    pub destination: Position,
    pub direction: Direction,
    pub color: Color,
    /// `destination` is a sentinel and nothing listens there.
    pub infinite: bool,
}

/// An emission waiting to be routed within the current tick.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Transit {
    pub origin: Position,
    pub dir: Direction,
    pub color: Color,
}

impl Transit {
    #[inline]
    pub fn emission(origin: Position, dir: Direction, color: Color) -> Self {
        Self {
            origin,
            dir,
            color: color.clamped(),
        }
    }
}
