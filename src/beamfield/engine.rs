use std::collections::VecDeque;

use thiserror::Error;

use super::beam::{Beam, Transit};
use super::cell::{Color, Position};
use super::component::{Capabilities, Component};
use super::direction::Direction;
use super::links::{LinkError, NeighborIndex};
use super::pool::{ObjectPool, PoolIdx};
use super::render::{Headless, RenderSink};
use super::sparse::{DEFAULT_GROWTH_STEP, SparseGrid};

/// Environment override for [`BeamFieldConfig::max_resolutions_per_tick`].
pub const MAX_RESOLUTIONS_ENV: &str = "BEAMFIELD_MAX_RESOLUTIONS";

const DEFAULT_POOL_CAPACITY: usize = 64;

/// Configuration for a [`BeamField`].
///
/// `BeamFieldConfig::default()` matches the unbounded engine; customise via
/// the builder methods or load it with serde.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BeamFieldConfig {
    /// Upper bound on beams resolved in one tick. `None` trusts components
    /// not to build manipulator cycles.
    pub max_resolutions_per_tick: Option<usize>,
    /// Sparse directory growth in cells (rounded up to whole 64-cell pages).
    pub growth_step: usize,
    /// Initial slots reserved in the link and beam pools.
    pub pool_capacity: usize,
}

impl Default for BeamFieldConfig {
    fn default() -> Self {
        Self {
            max_resolutions_per_tick: None,
            growth_step: DEFAULT_GROWTH_STEP,
            pool_capacity: DEFAULT_POOL_CAPACITY,
        }
    }
}

impl BeamFieldConfig {
    /// Defaults plus `BEAMFIELD_MAX_RESOLUTIONS` (`0` or empty disables the cap).
    pub fn from_env() -> Self {
        let config = Self::default();
        match std::env::var(MAX_RESOLUTIONS_ENV) {
            Ok(raw) => config.apply_resolution_override(&raw),
            Err(_) => config,
        }
    }

    fn apply_resolution_override(mut self, raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return self;
        }
        match raw.parse::<usize>() {
            Ok(0) => self.max_resolutions_per_tick = None,
            Ok(n) => self.max_resolutions_per_tick = Some(n),
            Err(_) => log::warn!("ignoring {MAX_RESOLUTIONS_ENV}={raw:?}: expected a count"),
        }
        self
    }

    /// Cap beam resolutions per tick.
    pub fn max_resolutions_per_tick(mut self, n: usize) -> Self {
        self.max_resolutions_per_tick = Some(n.max(1));
        self
    }

    pub fn growth_step(mut self, cells: usize) -> Self {
        self.growth_step = cells.max(1);
        self
    }

    pub fn pool_capacity(mut self, slots: usize) -> Self {
        self.pool_capacity = slots;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("cell ({}, {}) is already occupied", .0.x, .0.y)]
    Occupied(Position),
    #[error("({}, {}) is reserved for the infinity sentinels", .0.x, .0.y)]
    ReservedCoordinate(Position),
    #[error("no component at ({}, {})", .0.x, .0.y)]
    NotFound(Position),
}

/// Counters for one [`BeamField::tick`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    pub generation: u64,
    pub emitted: usize,
    pub resolved: usize,
    pub delivered: usize,
    pub ticked: usize,
    /// The resolution cap stopped propagation before a fixed point.
    pub possible_beam_loop: bool,
}

/// Placement metadata visible to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlacementInfo {
    pub orientation: Direction,
    pub flipped: bool,
    pub capabilities: Capabilities,
}

struct Placement {
    component: Box<dyn Component>,
    orientation: Direction,
    flipped: bool,
    caps: Capabilities,
    /// Outgoing beam records, indexed by absolute direction.
    beams: [Option<PoolIdx>; 4],
    /// Last color delivered per absolute travel direction of the beam.
    delivered: [Color; 4],
    /// Consumer deliveries staged during resolution.
    inbox: [Option<Color>; 4],
    in_inbox_list: bool,
    queued_producer: bool,
    /// Bit per absolute direction with a reroute already queued.
    reroute_pending: u8,
    tick_slot: Option<usize>,
}

impl Placement {
    fn new(component: Box<dyn Component>, orientation: Direction, flipped: bool, caps: Capabilities) -> Self {
        Self {
            component,
            orientation,
            flipped,
            caps,
            beams: [None; 4],
            delivered: [Color::ZERO; 4],
            inbox: [None; 4],
            in_inbox_list: false,
            queued_producer: false,
            reroute_pending: 0,
            tick_slot: None,
        }
    }

    #[inline]
    fn info(&self) -> PlacementInfo {
        PlacementInfo {
            orientation: self.orientation,
            flipped: self.flipped,
            capabilities: self.caps,
        }
    }

    /// Record `color` as delivered from `dir`; false when it is a repeat of
    /// darkness and must not be delivered again.
    #[inline]
    fn accept(&mut self, dir: Direction, color: Color) -> bool {
        let slot = &mut self.delivered[dir.index()];
        if color.is_zero() && slot.is_zero() {
            return false;
        }
        *slot = color;
        true
    }
}

/// Sparse beam field: placements, neighbor links and the tick scheduler.
pub struct BeamField<R: RenderSink = Headless> {
    config: BeamFieldConfig,
    grid: SparseGrid<Placement>,
    links: NeighborIndex,
    beams: ObjectPool<Beam>,
    renderer: R,
    generation: u64,
    producers: Vec<Position>,
    tickables: Vec<Position>,
    inbox_list: Vec<Position>,
    transits: VecDeque<Transit>,
    /// Beams whose path changed since the last tick: `(origin, direction)`.
    reroutes: Vec<(Position, Direction)>,
    /// Beams that stopped arriving: `(destination, direction)`. Resolved
    /// after every pending emission so a replacement beam can cancel them.
    darkness: VecDeque<(Position, Direction)>,
}

impl Default for BeamField {
    fn default() -> Self {
        Self::new()
    }
}

impl BeamField {
    /// Headless field with default configuration.
    pub fn new() -> Self {
        Self::with_config(BeamFieldConfig::default())
    }

    pub fn with_config(config: BeamFieldConfig) -> Self {
        Self::with_renderer(config, Headless)
    }
}

impl<R: RenderSink> BeamField<R> {
    pub fn with_renderer(config: BeamFieldConfig, renderer: R) -> Self {
        Self {
            grid: SparseGrid::with_growth_step(config.growth_step),
            links: NeighborIndex::with_storage(config.growth_step, config.pool_capacity),
            beams: ObjectPool::with_capacity(config.pool_capacity),
            renderer,
            generation: 0,
            producers: Vec::new(),
            tickables: Vec::new(),
            inbox_list: Vec::new(),
            transits: VecDeque::new(),
            reroutes: Vec::new(),
            darkness: VecDeque::new(),
            config,
        }
    }

    pub fn config(&self) -> &BeamFieldConfig {
        &self.config
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Completed ticks.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.grid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }

    pub fn bounds(&self) -> Option<(i32, i32, i32, i32)> {
        self.grid.bounds()
    }

    pub fn get(&self, x: i32, y: i32) -> Option<&dyn Component> {
        self.grid.get(x, y).map(|p| p.component.as_ref())
    }

    /// Direct access to a placed component. State changes made here are
    /// picked up by the next `tick`, `force_tick` or `interact`.
    pub fn get_mut(&mut self, x: i32, y: i32) -> Option<&mut (dyn Component + 'static)> {
        self.grid.get_mut(x, y).map(|p| p.component.as_mut())
    }

    pub fn placement(&self, x: i32, y: i32) -> Option<PlacementInfo> {
        self.grid.get(x, y).map(Placement::info)
    }

    pub fn for_each_placement<F: FnMut(Position, &dyn Component, PlacementInfo)>(&self, mut f: F) {
        self.grid.for_each(|pos, p| f(pos, p.component.as_ref(), p.info()));
    }

    /// Nearest occupied cell from `(x, y)` towards `dir`; `None` is open to
    /// infinity.
    pub fn neighbor(&self, x: i32, y: i32, dir: Direction) -> Option<Position> {
        self.links.neighbor(x, y, dir)
    }

    /// The beam currently leaving `(x, y)` towards absolute `dir`.
    pub fn beam(&self, x: i32, y: i32, dir: Direction) -> Option<&Beam> {
        let idx = self.grid.get(x, y)?.beams[dir.index()]?;
        self.beams.get(idx)
    }

    /// Place `component`, replacing any current occupant.
    ///
    /// A replacement keeps the cell's neighbor links. The previous occupant
    /// is returned; its outgoing beams are retracted on the next tick.
    pub fn place(
        &mut self,
        x: i32,
        y: i32,
        orientation: Direction,
        flipped: bool,
        mut component: Box<dyn Component>,
    ) -> Result<Option<Box<dyn Component>>, FieldError> {
        let pos = Position::new(x, y);
        if pos.is_reserved() {
            return Err(FieldError::ReservedCoordinate(pos));
        }
        let caps = Capabilities::of(component.as_mut());
        let visual = component.visual();

        let previous = match self.grid.get_mut(x, y) {
            Some(existing) => {
                let old = std::mem::replace(&mut existing.component, component);
                existing.orientation = orientation;
                existing.flipped = flipped;
                existing.caps = caps;
                existing.delivered = [Color::ZERO; 4];
                existing.inbox = [None; 4];
                self.drop_outgoing(pos);
                log::debug!("replaced component at ({x},{y})");
                Some(old)
            }
            None => {
                self.grid.set(x, y, Placement::new(component, orientation, flipped, caps));
                let linked = self.links.insert(x, y);
                debug_assert!(linked, "link record existed without a placement at ({x},{y})");
                log::debug!("placed component at ({x},{y}) caps={caps:?}");
                None
            }
        };
        debug_assert_eq!(self.grid.len(), self.links.len());

        self.sync_tick_slot(pos);
        self.queue_if_producer(pos);
        self.reroute_incoming(pos);
        self.renderer.on_placed(pos, orientation, flipped, visual);
        Ok(previous)
    }

    /// Strict placement: refuses an occupied cell.
    pub fn insert(
        &mut self,
        x: i32,
        y: i32,
        orientation: Direction,
        flipped: bool,
        component: Box<dyn Component>,
    ) -> Result<(), FieldError> {
        if self.grid.contains(x, y) {
            return Err(FieldError::Occupied(Position::new(x, y)));
        }
        self.place(x, y, orientation, flipped, component).map(|_| ())
    }

    /// Remove and return the component at `(x, y)`.
    pub fn remove(&mut self, x: i32, y: i32) -> Option<Box<dyn Component>> {
        let pos = Position::new(x, y);
        let neighbors = self.links.links(x, y)?;
        self.drop_outgoing(pos);
        self.clear_tick_slot(pos);

        let placement = self.grid.remove(x, y)?;
        let unlinked = self.links.remove(x, y);
        debug_assert!(unlinked, "placement at ({x},{y}) had no link record");
        debug_assert_eq!(self.grid.len(), self.links.len());

        // Beams that ended here now travel on to the next occupied cell.
        for dir in Direction::ALL {
            if let Some(n) = neighbors[dir.index()] {
                self.queue_reroute(n, dir.opposite());
            }
        }
        self.renderer.on_removed(pos);
        log::debug!("removed component at ({x},{y})");
        Some(placement.component)
    }

    /// Remove everything. The renderer sees one `on_removed` per placement.
    pub fn clear(&mut self) {
        let renderer = &mut self.renderer;
        self.grid.for_each(|pos, _| renderer.on_removed(pos));
        self.grid.clear();
        self.links.clear();
        self.beams.clear();
        self.producers.clear();
        self.tickables.clear();
        self.inbox_list.clear();
        self.transits.clear();
        self.reroutes.clear();
        self.darkness.clear();
    }

    /// Run one simulation step: reroute, emit, resolve, consume, tick.
    pub fn tick(&mut self) -> TickStats {
        self.generation += 1;
        let mut stats = TickStats {
            generation: self.generation,
            ..TickStats::default()
        };

        self.queue_path_changes();
        self.collect_emissions(&mut stats);
        self.resolve(&mut stats);
        self.consume(&mut stats);
        self.run_tickables(&mut stats);

        log::trace!(
            "tick {}: emitted={} resolved={} delivered={} ticked={}",
            stats.generation,
            stats.emitted,
            stats.resolved,
            stats.delivered,
            stats.ticked
        );
        stats
    }

    /// Run the tick phase for one component now. Returns whether its
    /// visual state changed.
    pub fn force_tick(&mut self, x: i32, y: i32) -> Result<bool, FieldError> {
        let pos = Position::new(x, y);
        self.tick_one(pos).ok_or(FieldError::NotFound(pos))
    }

    /// Forward a user interaction, then run its tick phase.
    pub fn interact(&mut self, x: i32, y: i32) -> Result<bool, FieldError> {
        let pos = Position::new(x, y);
        let placement = self.grid.get_mut(x, y).ok_or(FieldError::NotFound(pos))?;
        if placement.caps.contains(Capabilities::INTERACTIVE)
            && let Some(interactive) = placement.component.as_interactive()
        {
            interactive.on_interact();
        }
        self.force_tick(x, y)
    }

    /// Neighbor links are mutual and nearest, and every placement has a
    /// link record.
    pub fn check_invariants(&self) -> Result<(), LinkError> {
        for (pos, _) in self.grid.iter() {
            if !self.links.has_record(pos.x, pos.y) {
                return Err(LinkError::MissingRecord(pos));
            }
        }
        if self.grid.len() != self.links.len() {
            return Err(LinkError::CountMismatch {
                placements: self.grid.len(),
                records: self.links.len(),
            });
        }
        self.links.check_symmetry()
    }

    // ── Bookkeeping ─────────────────────────────────────────────────────

    fn sync_tick_slot(&mut self, pos: Position) {
        let Some(p) = self.grid.get_mut(pos.x, pos.y) else {
            return;
        };
        let tickable = p.caps.contains(Capabilities::TICKABLE);
        match (tickable, p.tick_slot) {
            (true, None) => {
                p.tick_slot = Some(self.tickables.len());
                self.tickables.push(pos);
            }
            (false, Some(_)) => self.clear_tick_slot(pos),
            _ => {}
        }
    }

    fn clear_tick_slot(&mut self, pos: Position) {
        let Some(slot) = self
            .grid
            .get_mut(pos.x, pos.y)
            .and_then(|p| p.tick_slot.take())
        else {
            return;
        };
        self.tickables.swap_remove(slot);
        if let Some(&moved) = self.tickables.get(slot)
            && let Some(p) = self.grid.get_mut(moved.x, moved.y)
        {
            p.tick_slot = Some(slot);
        }
    }

    fn queue_if_producer(&mut self, pos: Position) {
        let Some(p) = self.grid.get_mut(pos.x, pos.y) else {
            return;
        };
        if p.queued_producer || !p.caps.contains(Capabilities::PRODUCER) {
            return;
        }
        let wants = p.component.as_producer().is_some_and(|producer| producer.wants_emit());
        if wants {
            p.queued_producer = true;
            self.producers.push(pos);
        }
    }

    fn queue_reroute(&mut self, origin: Position, dir: Direction) {
        let Some(p) = self.grid.get_mut(origin.x, origin.y) else {
            return;
        };
        let bit = 1u8 << dir.index();
        if p.beams[dir.index()].is_none() || p.reroute_pending & bit != 0 {
            return;
        }
        p.reroute_pending |= bit;
        self.reroutes.push((origin, dir));
    }

    /// Beams from the four neighbors that now stop at `pos`.
    fn reroute_incoming(&mut self, pos: Position) {
        for dir in Direction::ALL {
            if let Some(n) = self.links.neighbor(pos.x, pos.y, dir) {
                self.queue_reroute(n, dir.opposite());
            }
        }
    }

    /// Release `pos`'s beam records and schedule darkness where they landed.
    fn drop_outgoing(&mut self, pos: Position) {
        let Some(p) = self.grid.get_mut(pos.x, pos.y) else {
            return;
        };
        for dir in Direction::ALL {
            let Some(idx) = p.beams[dir.index()].take() else {
                continue;
            };
            let Some(beam) = self.beams.release(idx) else {
                continue;
            };
            if !beam.infinite && !beam.color.is_zero() {
                self.darkness.push_back((beam.destination, dir));
            }
            self.renderer.on_beam_cleared(pos, dir);
        }
    }

    // ── Tick phases ─────────────────────────────────────────────────────

    /// Re-resolve every beam whose path changed, once per origin and
    /// direction however many edits touched it.
    fn queue_path_changes(&mut self) {
        let mut reroutes = std::mem::take(&mut self.reroutes);
        for &(origin, dir) in &reroutes {
            let Some(p) = self.grid.get_mut(origin.x, origin.y) else {
                continue;
            };
            let bit = 1u8 << dir.index();
            if p.reroute_pending & bit == 0 {
                continue;
            }
            p.reroute_pending &= !bit;
            let Some(idx) = p.beams[dir.index()] else {
                continue;
            };
            if let Some(beam) = self.beams.get(idx) {
                self.transits.push_back(Transit::emission(origin, dir, beam.color));
            }
        }
        reroutes.clear();
        self.reroutes = reroutes;
    }

    fn collect_emissions(&mut self, stats: &mut TickStats) {
        let mut producers = std::mem::take(&mut self.producers);
        for &pos in &producers {
            // Removed or already drained; re-placed producers are queued again.
            let Some(p) = self.grid.get_mut(pos.x, pos.y) else {
                continue;
            };
            if !p.queued_producer {
                continue;
            }
            p.queued_producer = false;
            let (orientation, flipped) = (p.orientation, p.flipped);
            let Some(producer) = p.component.as_producer() else {
                continue;
            };
            if !producer.wants_emit() {
                continue;
            }
            let transits = &mut self.transits;
            producer.emit(&mut |local, color| {
                transits.push_back(Transit::emission(pos, local.to_absolute(orientation, flipped), color));
                stats.emitted += 1;
            });
        }
        producers.clear();
        // Keep the allocation; nothing queues producers during emission.
        debug_assert!(self.producers.is_empty());
        self.producers = producers;
    }

    /// Route emissions breadth first; darkness is settled only once no
    /// emission is pending.
    fn resolve(&mut self, stats: &mut TickStats) {
        let cap = self.config.max_resolutions_per_tick;
        loop {
            let pending = self.transits.len() + self.darkness.len();
            if pending == 0 {
                break;
            }
            if let Some(cap) = cap
                && stats.resolved >= cap
            {
                log::warn!(
                    "tick {}: stopped after {cap} beam resolutions, {pending} pending; possible beam loop",
                    self.generation
                );
                stats.possible_beam_loop = true;
                self.transits.clear();
                self.darkness.clear();
                break;
            }
            stats.resolved += 1;
            if let Some(transit) = self.transits.pop_front() {
                self.route(transit, stats);
            } else if let Some((pos, dir)) = self.darkness.pop_front()
                && !self.lit_from(pos, dir)
            {
                self.deliver_now(pos, dir, Color::ZERO, stats);
            }
        }
    }

    /// Whether a nonzero beam travelling `dir` currently ends at `pos`.
    fn lit_from(&self, pos: Position, dir: Direction) -> bool {
        let Some(from) = self.links.neighbor(pos.x, pos.y, dir.opposite()) else {
            return false;
        };
        self.beam(from.x, from.y, dir)
            .is_some_and(|beam| !beam.infinite && beam.destination == pos && !beam.color.is_zero())
    }

    /// Resolve an emission through the links, update the origin's record,
    /// and hand the beam to whatever it hits.
    fn route(&mut self, transit: Transit, stats: &mut TickStats) {
        let Transit { origin, dir, color } = transit;
        let (destination, infinite) = match self.links.neighbor(origin.x, origin.y, dir) {
            Some(hit) => (hit, false),
            None => (origin.infinity(dir), true),
        };
        let Some(p) = self.grid.get_mut(origin.x, origin.y) else {
            return;
        };
        let record = Beam {
            origin,
            destination,
            direction: dir,
            color,
            infinite,
        };
        let previous = match p.beams[dir.index()].and_then(|idx| self.beams.get_mut(idx)) {
            Some(beam) => Some(std::mem::replace(beam, record)),
            None => {
                p.beams[dir.index()] = Some(self.beams.acquire(record));
                None
            }
        };

        if let Some(prev) = previous
            && prev.destination != destination
            && !prev.infinite
        {
            self.deliver(prev.destination, dir, Color::ZERO, stats);
        }
        if previous != Some(record) {
            if color.is_zero() {
                self.renderer.on_beam_cleared(origin, dir);
            } else {
                self.renderer.on_beam(origin, destination, color, infinite);
            }
        }
        if !infinite {
            self.deliver(destination, dir, color, stats);
        }
    }

    fn deliver(&mut self, pos: Position, dir: Direction, color: Color, stats: &mut TickStats) {
        if color.is_zero() {
            self.darkness.push_back((pos, dir));
        } else {
            self.deliver_now(pos, dir, color, stats);
        }
    }

    /// Manipulators react immediately and consumers are staged.
    fn deliver_now(&mut self, pos: Position, dir: Direction, color: Color, stats: &mut TickStats) {
        let Some(p) = self.grid.get_mut(pos.x, pos.y) else {
            return;
        };
        if p.caps.contains(Capabilities::MANIPULATOR) {
            if !p.accept(dir, color) {
                return;
            }
            let (orientation, flipped) = (p.orientation, p.flipped);
            let Some(manipulator) = p.component.as_manipulator() else {
                return;
            };
            let transits = &mut self.transits;
            manipulator.incoming_beam(dir.to_local(orientation, flipped), color, &mut |local, out| {
                transits.push_back(Transit::emission(pos, local.to_absolute(orientation, flipped), out));
            });
            stats.delivered += 1;
        } else if p.caps.contains(Capabilities::CONSUMER) {
            p.inbox[dir.index()] = Some(color);
            if !p.in_inbox_list {
                p.in_inbox_list = true;
                self.inbox_list.push(pos);
            }
        }
    }

    fn consume(&mut self, stats: &mut TickStats) {
        let mut inbox_list = std::mem::take(&mut self.inbox_list);
        for &pos in &inbox_list {
            let Some(p) = self.grid.get_mut(pos.x, pos.y) else {
                continue;
            };
            if !p.in_inbox_list {
                continue;
            }
            p.in_inbox_list = false;
            let inbox = std::mem::take(&mut p.inbox);
            for dir in Direction::ALL {
                let Some(color) = inbox[dir.index()] else {
                    continue;
                };
                if !p.accept(dir, color) {
                    continue;
                }
                let local = dir.to_local(p.orientation, p.flipped);
                if let Some(consumer) = p.component.as_consumer() {
                    consumer.incoming_beam(local, color);
                    stats.delivered += 1;
                }
            }
        }
        inbox_list.clear();
        self.inbox_list = inbox_list;
    }

    fn run_tickables(&mut self, stats: &mut TickStats) {
        let tickables = std::mem::take(&mut self.tickables);
        for &pos in &tickables {
            if self.tick_one(pos).is_some() {
                stats.ticked += 1;
            }
        }
        debug_assert!(self.tickables.is_empty());
        self.tickables = tickables;
    }

    /// Tick phase for a single placement. `None` when `pos` is empty.
    fn tick_one(&mut self, pos: Position) -> Option<bool> {
        let p = self.grid.get_mut(pos.x, pos.y)?;
        let changed = p.component.as_tickable().is_some_and(|t| t.tick());
        if changed {
            let visual = p.component.visual();
            self.renderer.on_visual_changed(pos, visual);
        }
        if !p.queued_producer
            && p.caps.contains(Capabilities::PRODUCER)
            && p.component.as_producer().is_some_and(|producer| producer.wants_emit())
        {
            p.queued_producer = true;
            self.producers.push(pos);
        }
        Some(changed)
    }
}
