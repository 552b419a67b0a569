//! Beam field internals and public API.

mod beam;
mod cell;
mod component;
mod direction;
mod engine;
mod links;
mod pool;
mod render;
mod sparse;

pub use beam::Beam;
pub use cell::{Color, Position};
pub use component::{Capabilities, Component, Consumer, Interactive, Manipulator, Producer, Tickable, Visual};
pub use direction::Direction;
pub use engine::{BeamField, BeamFieldConfig, FieldError, MAX_RESOLUTIONS_ENV, PlacementInfo, TickStats};
pub use links::{LinkError, NeighborIndex};
pub use pool::{ObjectPool, PoolIdx};
pub use render::{Headless, RenderSink};
pub use sparse::SparseGrid;
