use std::collections::HashSet;

use beam_field::beamfield::{BeamField, BeamFieldConfig, Component, Direction, NeighborIndex, Position};
use rand::{Rng, SeedableRng};

struct Wall;

impl Component for Wall {}

fn naive_neighbor(cells: &HashSet<(i32, i32)>, x: i32, y: i32, dir: Direction) -> Option<Position> {
    cells
        .iter()
        .filter(|&&(cx, cy)| match dir {
            Direction::Right => cy == y && cx > x,
            Direction::Left => cy == y && cx < x,
            Direction::Down => cx == x && cy > y,
            Direction::Up => cx == x && cy < y,
        })
        .min_by_key(|&&(cx, cy)| (cx - x).abs() + (cy - y).abs())
        .map(|&(cx, cy)| Position::new(cx, cy))
}

fn assert_matches_naive(field: &BeamField, cells: &HashSet<(i32, i32)>) {
    assert_eq!(field.len(), cells.len());
    for &(x, y) in cells {
        for dir in Direction::ALL {
            assert_eq!(
                field.neighbor(x, y, dir),
                naive_neighbor(cells, x, y, dir),
                "neighbor of ({x},{y}) towards {dir:?}"
            );
        }
    }
}

#[test]
fn random_interleavings_keep_links_nearest_and_mutual() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(0xB3A4_11FE_1D00);
    let mut field = BeamField::with_config(BeamFieldConfig::default().growth_step(64));
    let mut cells = HashSet::new();

    for round in 0..2_000 {
        let x = rng.random_range(-40..40);
        let y = rng.random_range(-40..40);
        if cells.remove(&(x, y)) {
            assert!(field.remove(x, y).is_some());
        } else {
            field.insert(x, y, Direction::Right, false, Box::new(Wall)).unwrap();
            cells.insert((x, y));
        }
        if round % 97 == 0 {
            assert_matches_naive(&field, &cells);
            field.check_invariants().unwrap();
        }
    }
    assert_matches_naive(&field, &cells);
    field.check_invariants().unwrap();
}

#[test]
fn placement_and_link_records_stay_in_lockstep() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(0x10C4_57E9);
    let mut field = BeamField::new();

    for _ in 0..1_000 {
        let x = rng.random_range(-12..12);
        let y = rng.random_range(-12..12);
        if rng.random_bool(0.4) {
            field.remove(x, y);
        } else {
            // `place` replaces in place; the link record must survive.
            let _ = field.place(x, y, Direction::Up, rng.random_bool(0.5), Box::new(Wall));
        }
    }
    field.check_invariants().unwrap();

    let mut placed = 0;
    field.for_each_placement(|pos, _, info| {
        placed += 1;
        assert_eq!(info.orientation, Direction::Up);
        assert!(field.get(pos.x, pos.y).is_some());
    });
    assert_eq!(placed, field.len());
}

#[test]
fn sparse_rows_far_apart_link_directly() {
    let mut index = NeighborIndex::new();
    let xs = [-200_000, -3, 0, 64, 65, 4_096, 150_000];
    for &x in &xs {
        assert!(index.insert(x, 7));
    }
    for pair in xs.windows(2) {
        assert_eq!(index.neighbor(pair[0], 7, Direction::Right), Some(Position::new(pair[1], 7)));
        assert_eq!(index.neighbor(pair[1], 7, Direction::Left), Some(Position::new(pair[0], 7)));
    }
    assert_eq!(index.neighbor(150_000, 7, Direction::Right), None);
    assert_eq!(index.neighbor(-200_000, 7, Direction::Left), None);
    index.check_symmetry().unwrap();

    assert!(index.remove(0, 7));
    assert_eq!(index.neighbor(-3, 7, Direction::Right), Some(Position::new(64, 7)));
    index.check_symmetry().unwrap();
}
