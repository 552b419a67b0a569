use beam_field::beamfield::{
    BeamField, BeamFieldConfig, Color, Component, Consumer, Direction, Manipulator, Producer,
    Tickable, Visual,
};
use rand::{Rng, SeedableRng};
use std::time::Instant;

const DEFAULT_TICKS: u64 = 2000;
const DEFAULT_COMPONENTS: usize = 20_000;
const DEFAULT_SPREAD: i32 = 1 << 16;
const DEFAULT_SEED: u64 = 0xBEA3_F1E1_D5EE_D001;
const REPORT_INTERVAL: u64 = 500;

struct MainArgs {
    config: BeamFieldConfig,
    ticks: u64,
    components: usize,
    spread: i32,
    seed: u64,
    churn: usize,
}

fn parse_args() -> MainArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = MainArgs {
        config: BeamFieldConfig::from_env(),
        ticks: DEFAULT_TICKS,
        components: DEFAULT_COMPONENTS,
        spread: DEFAULT_SPREAD,
        seed: DEFAULT_SEED,
        churn: 0,
    };
    let next_arg = |i: usize, flag: &str| -> &str {
        args.get(i)
            .map(String::as_str)
            .unwrap_or_else(|| panic!("{flag} requires a value"))
    };
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--ticks" => {
                i += 1;
                parsed.ticks = next_arg(i, "--ticks")
                    .parse()
                    .expect("--ticks requires a positive integer");
            }
            "--components" => {
                i += 1;
                parsed.components = next_arg(i, "--components")
                    .parse()
                    .expect("--components requires a positive integer");
            }
            "--spread" => {
                i += 1;
                let spread: i32 = next_arg(i, "--spread")
                    .parse()
                    .expect("--spread requires a positive integer");
                parsed.spread = spread.clamp(1, i32::MAX / 2);
            }
            "--seed" => {
                i += 1;
                parsed.seed = next_arg(i, "--seed")
                    .parse()
                    .expect("--seed requires an unsigned integer");
            }
            "--churn" => {
                i += 1;
                parsed.churn = next_arg(i, "--churn")
                    .parse()
                    .expect("--churn requires a non-negative integer");
            }
            "--max-resolutions" => {
                i += 1;
                let n: usize = next_arg(i, "--max-resolutions")
                    .parse()
                    .expect("--max-resolutions requires a positive integer");
                parsed.config = parsed.config.max_resolutions_per_tick(n);
            }
            other => panic!(
                "unknown argument: {other}\nusage: beam-field [--ticks N] [--components N] [--spread N] [--seed N] [--churn N] [--max-resolutions N]"
            ),
        }
        i += 1;
    }
    // Random mirrors can close a cycle; always run the benchmark bounded.
    if parsed.config.max_resolutions_per_tick.is_none() {
        parsed.config = parsed
            .config
            .max_resolutions_per_tick(parsed.components.saturating_mul(64));
    }
    parsed
}

/// Pulses a color to the right every `period` ticks.
struct Emitter {
    period: u32,
    phase: u32,
    color: Color,
}

impl Producer for Emitter {
    fn emit(&mut self, out: &mut dyn FnMut(Direction, Color)) {
        out(Direction::Right, self.color);
    }

    fn wants_emit(&self) -> bool {
        self.phase == 0
    }
}

impl Tickable for Emitter {
    fn tick(&mut self) -> bool {
        self.phase = (self.phase + 1) % self.period;
        if self.phase == 0 {
            // Alternate between lit and dark so downstream sees changes.
            self.color = if self.color.is_zero() {
                Color::new(1.0, 0.5, 0.25)
            } else {
                Color::ZERO
            };
        }
        false
    }
}

impl Component for Emitter {
    fn visual(&self) -> Visual {
        Visual(u32::from(!self.color.is_zero()))
    }

    fn as_producer(&mut self) -> Option<&mut dyn Producer> {
        Some(self)
    }

    fn as_tickable(&mut self) -> Option<&mut dyn Tickable> {
        Some(self)
    }
}

/// Turns every beam a quarter clockwise.
struct Mirror;

impl Manipulator for Mirror {
    fn incoming_beam(&mut self, dir: Direction, color: Color, out: &mut dyn FnMut(Direction, Color)) {
        out(dir.add(Direction::Down), color);
    }
}

impl Component for Mirror {
    fn as_manipulator(&mut self) -> Option<&mut dyn Manipulator> {
        Some(self)
    }
}

#[derive(Default)]
struct Sink {
    lit: u8,
}

impl Consumer for Sink {
    fn incoming_beam(&mut self, dir: Direction, color: Color) {
        let bit = 1 << dir.index();
        if color.is_zero() {
            self.lit &= !bit;
        } else {
            self.lit |= bit;
        }
    }
}

impl Component for Sink {
    fn visual(&self) -> Visual {
        Visual(u32::from(self.lit))
    }

    fn as_consumer(&mut self) -> Option<&mut dyn Consumer> {
        Some(self)
    }
}

fn random_component(rng: &mut impl Rng) -> Box<dyn Component> {
    match rng.random_range(0..10) {
        0..=2 => Box::new(Emitter {
            period: rng.random_range(1..16),
            phase: 0,
            color: Color::new(rng.random(), rng.random(), rng.random()),
        }),
        3..=4 => Box::new(Mirror),
        _ => Box::new(Sink::default()),
    }
}

/// A band of rows keeps the field sparse along x but still connected.
fn band_rows(count: usize) -> i32 {
    i32::try_from(count / 64).unwrap_or(i32::MAX / 2).max(1)
}

fn random_cell(rng: &mut impl Rng, spread: i32, rows: i32) -> (i32, i32) {
    (rng.random_range(-spread..spread), rng.random_range(-rows..rows))
}

fn seed_field(field: &mut BeamField, rng: &mut impl Rng, count: usize, spread: i32) {
    let rows = band_rows(count);
    for _ in 0..count {
        let (x, y) = random_cell(rng, spread, rows);
        let orientation = Direction::from_index(rng.random_range(0..4));
        let flipped = rng.random_bool(0.5);
        if let Err(err) = field.place(x, y, orientation, flipped, random_component(rng)) {
            log::warn!("skipping seed cell: {err}");
        }
    }
}

fn main() {
    let args = parse_args();
    let mut rng = rand::rngs::StdRng::seed_from_u64(args.seed);
    let mut field = BeamField::with_config(args.config.clone());

    let start = Instant::now();
    seed_field(&mut field, &mut rng, args.components, args.spread);
    let seed_ms = start.elapsed().as_secs_f64() * 1000.0;
    println!("Seeded {} components in {seed_ms:.3} ms", field.len());

    let mut total = std::time::Duration::ZERO;
    let mut phase = std::time::Duration::ZERO;
    let mut resolved = 0usize;
    let mut loops = 0u64;
    for tick in 1..=args.ticks {
        let start = Instant::now();
        for _ in 0..args.churn {
            let (x, y) = random_cell(&mut rng, args.spread, band_rows(args.components));
            if field.remove(x, y).is_none() {
                let component = random_component(&mut rng);
                if let Err(err) = field.place(x, y, Direction::Right, false, component) {
                    log::warn!("churn placement failed: {err}");
                }
            }
        }
        let stats = field.tick();
        let elapsed = start.elapsed();
        total += elapsed;
        phase += elapsed;
        resolved += stats.resolved;
        loops += u64::from(stats.possible_beam_loop);

        if tick % REPORT_INTERVAL == 0 {
            let phase_ms = phase.as_secs_f64() * 1000.0;
            let avg_ms = phase_ms / REPORT_INTERVAL as f64;
            println!(
                "Tick {tick}: {} components, {resolved} beams resolved | {phase_ms:.3} ms, {avg_ms:.6} ms/tick",
                field.len()
            );
            phase = std::time::Duration::ZERO;
        }
    }

    let total_ms = total.as_secs_f64() * 1000.0;
    let ticks_per_sec = args.ticks as f64 / total.as_secs_f64().max(f64::EPSILON);
    println!("\n--- Summary ({} ticks) ---", args.ticks);
    println!("{total_ms:.3} ms total, {ticks_per_sec:.1} ticks/s, {resolved} resolutions");
    if loops > 0 {
        println!("Resolution cap tripped on {loops} ticks");
    }
    if let Err(err) = field.check_invariants() {
        panic!("neighbor index corrupted: {err}");
    }
    std::hint::black_box(field.generation());
}
