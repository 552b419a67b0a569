//! Sparse beam simulation on an unbounded grid.

pub mod beamfield;
pub use beamfield::{BeamField, BeamFieldConfig, Color, Component, Direction, FieldError, Position, RenderSink};
