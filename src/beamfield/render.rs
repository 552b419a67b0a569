//! Render notifications.
//!
//! The field calls these synchronously from `place`/`remove`/`tick`. Every
//! method defaults to a no-op, so a sink only overrides what it draws.

use super::cell::{Color, Position};
use super::component::Visual;
use super::direction::Direction;

pub trait RenderSink {
    fn on_placed(&mut self, _pos: Position, _orientation: Direction, _flipped: bool, _visual: Visual) {}

    fn on_removed(&mut self, _pos: Position) {}

    fn on_visual_changed(&mut self, _pos: Position, _visual: Visual) {}

    /// A beam from `origin` now ends at `destination` with `color`. When
    /// `infinite` is set the destination is a sentinel coordinate.
    fn on_beam(&mut self, _origin: Position, _destination: Position, _color: Color, _infinite: bool) {}

    /// The beam leaving `origin` towards `dir` went dark or was dropped.
    fn on_beam_cleared(&mut self, _origin: Position, _dir: Direction) {}
}

/// Null sink for running without a renderer.
#[derive(Clone, Copy, Debug, Default)]
pub struct Headless;

impl RenderSink for Headless {}
