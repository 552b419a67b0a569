//! Capability contract implemented by placed components.
//!
//! A component always works in its local frame, where its own "right" side
//! is `Direction::Right`. The field converts directions at the placement
//! boundary. Each `as_*` accessor returns the capability if the component
//! has it; the field asks once at placement time and caches the answer as a
//! [`Capabilities`] bitset.

use super::cell::Color;
use super::direction::Direction;

/// Opaque visual state handed to the renderer (sprite/frame id).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Visual(pub u32);

/// Originates beams. Evaluated only while queued as a producer.
pub trait Producer {
    /// Emit zero or more `(local direction, color)` beams.
    fn emit(&mut self, out: &mut dyn FnMut(Direction, Color));

    /// Whether the component wants to emit on the next emission phase.
    fn wants_emit(&self) -> bool;
}

/// Receives final beam values once per tick, after resolution.
pub trait Consumer {
    fn incoming_beam(&mut self, dir: Direction, color: Color);
}

/// Reacts within the same logical instant by re-emitting from its own cell.
///
/// Implementations must not form uncontrolled cycles: the field resolves
/// manipulator chains until no emissions remain.
pub trait Manipulator {
    fn incoming_beam(&mut self, dir: Direction, color: Color, out: &mut dyn FnMut(Direction, Color));
}

/// Time-aware state advanced once per tick.
pub trait Tickable {
    /// Returns `true` when the visual state changed.
    fn tick(&mut self) -> bool;
}

/// Responds to direct user interaction.
pub trait Interactive {
    fn on_interact(&mut self);
}

pub trait Component {
    fn visual(&self) -> Visual {
        Visual::default()
    }

    fn as_producer(&mut self) -> Option<&mut dyn Producer> {
        None
    }

    fn as_consumer(&mut self) -> Option<&mut dyn Consumer> {
        None
    }

    fn as_manipulator(&mut self) -> Option<&mut dyn Manipulator> {
        None
    }

    fn as_tickable(&mut self) -> Option<&mut dyn Tickable> {
        None
    }

    fn as_interactive(&mut self) -> Option<&mut dyn Interactive> {
        None
    }
}

/// Cached capability classification of a placed component.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const NONE: Capabilities = Capabilities(0);
    pub const PRODUCER: Capabilities = Capabilities(1 << 0);
    pub const CONSUMER: Capabilities = Capabilities(1 << 1);
    pub const MANIPULATOR: Capabilities = Capabilities(1 << 2);
    pub const TICKABLE: Capabilities = Capabilities(1 << 3);
    pub const INTERACTIVE: Capabilities = Capabilities(1 << 4);

    /// Probe every accessor once.
    pub fn of(component: &mut dyn Component) -> Capabilities {
        let mut caps = Capabilities::NONE;
        if component.as_producer().is_some() {
            caps |= Capabilities::PRODUCER;
        }
        if component.as_consumer().is_some() {
            caps |= Capabilities::CONSUMER;
        }
        if component.as_manipulator().is_some() {
            caps |= Capabilities::MANIPULATOR;
        }
        if component.as_tickable().is_some() {
            caps |= Capabilities::TICKABLE;
        }
        if component.as_interactive().is_some() {
            caps |= Capabilities::INTERACTIVE;
        }
        caps
    }

    #[inline]
    pub const fn contains(self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// A beam landing here is delivered (instantly or at consumption).
    #[inline]
    pub const fn receives_beams(self) -> bool {
        self.0 & (Self::CONSUMER.0 | Self::MANIPULATOR.0) != 0
    }
}

impl std::ops::BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Self) -> Self {
        Capabilities(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for Capabilities {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}
