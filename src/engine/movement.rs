//! Movement policy shared by items and enemies: step one cell along the
//! facing, or re-pick the facing uniformly when blocked.

use crate::grid::Grid;
use crate::rng::Rng;
use crate::types::{Direction, MobileEntity, Vec2};

pub(super) fn step(x: i32, y: i32, dir: Direction) -> (i32, i32) {
    let (dx, dy) = dir.delta();
    (x + dx, y + dy)
}

pub(super) fn random_direction(rng: &mut Rng) -> Direction {
    Direction::ALL[rng.pick_index(Direction::ALL.len())]
}

/// One autonomous move attempt. A walkable candidate commits and keeps the
/// facing; a blocked candidate re-picks the facing uniformly over all four
/// directions, so the same blocked direction may come up again and the
/// entity stalls this interval. The stall is intended behavior, not a bug.
pub(super) fn advance(entity: &mut MobileEntity, grid: &Grid, rng: &mut Rng) {
    let (nx, ny) = step(entity.x, entity.y, entity.dir);
    if grid.is_walkable(nx, ny) {
        entity.x = nx;
        entity.y = ny;
    } else {
        entity.dir = random_direction(rng);
    }
}

/// Initial facing for a layout-placed enemy: uniform over the walkable
/// neighbor directions that do not point straight at the player's spawn
/// cell. Placement-time heuristic only; nothing enforces it later. Falls
/// back to a fully uniform facing when no direction qualifies.
pub(super) fn spawn_facing(x: i32, y: i32, grid: &Grid, player: Vec2, rng: &mut Rng) -> Direction {
    let candidates: Vec<Direction> = Direction::ALL
        .iter()
        .copied()
        .filter(|dir| {
            let (nx, ny) = step(x, y, *dir);
            grid.is_walkable(nx, ny) && !(nx == player.x && ny == player.y)
        })
        .collect();
    if candidates.is_empty() {
        random_direction(rng)
    } else {
        candidates[rng.pick_index(candidates.len())]
    }
}
