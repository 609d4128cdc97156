//! Board construction: layout placements plus fill-to-quota for items and
//! enemies. Fill attempts are budgeted so a crowded board fails the load
//! instead of spinning forever.

use super::movement::{random_direction, spawn_facing};
use crate::config::GameConfig;
use crate::error::GameError;
use crate::grid::Grid;
use crate::rng::Rng;
use crate::types::{Direction, MobileEntity, Vec2};

const FILL_ATTEMPTS_PER_CELL: usize = 20;

/// Everything a successful load produces. Built completely before any of it
/// is committed to the engine, so a failed load leaves prior state intact.
#[derive(Debug)]
pub(super) struct Board {
    pub grid: Grid,
    pub player: MobileEntity,
    pub goal: Vec2,
    pub items: Vec<MobileEntity>,
    pub enemies: Vec<MobileEntity>,
}

pub(super) fn build_board(
    rows: &[String],
    config: &GameConfig,
    rng: &mut Rng,
) -> Result<Board, GameError> {
    let (grid, placements) = Grid::from_layout(rows, config)?;

    let mut board = Board {
        player: MobileEntity::new(placements.player.x, placements.player.y, Direction::Up),
        goal: placements.goal,
        grid,
        items: Vec::new(),
        enemies: Vec::new(),
    };

    // Layout spawns beyond the configured caps are ignored.
    for pos in placements.items.iter().take(config.max_items) {
        board
            .items
            .push(MobileEntity::new(pos.x, pos.y, random_direction(rng)));
    }
    for pos in placements.enemies.iter().take(config.max_enemies) {
        let dir = spawn_facing(pos.x, pos.y, &board.grid, placements.player, rng);
        board.enemies.push(MobileEntity::new(pos.x, pos.y, dir));
    }

    while board.items.len() < config.max_items {
        let pos = pick_free_cell(&board, config, rng, "items")?;
        let dir = random_direction(rng);
        board.items.push(MobileEntity::new(pos.x, pos.y, dir));
    }
    while board.enemies.len() < config.max_enemies {
        let pos = pick_free_cell(&board, config, rng, "enemies")?;
        let dir = random_direction(rng);
        board.enemies.push(MobileEntity::new(pos.x, pos.y, dir));
    }

    tracing::debug!(
        items = board.items.len(),
        enemies = board.enemies.len(),
        "board built"
    );
    Ok(board)
}

fn is_occupied(board: &Board, x: i32, y: i32) -> bool {
    board.player.is_at(x, y)
        || (board.goal.x == x && board.goal.y == y)
        || board.items.iter().any(|item| item.is_at(x, y))
        || board.enemies.iter().any(|enemy| enemy.is_at(x, y))
}

fn pick_free_cell(
    board: &Board,
    config: &GameConfig,
    rng: &mut Rng,
    kind: &'static str,
) -> Result<Vec2, GameError> {
    let budget = (config.width * config.height) as usize * FILL_ATTEMPTS_PER_CELL;
    for _ in 0..budget {
        let x = rng.int(0, config.width - 1);
        let y = rng.int(0, config.height - 1);
        if board.grid.is_walkable(x, y) && !is_occupied(board, x, y) {
            return Ok(Vec2 { x, y });
        }
    }
    Err(GameError::PlacementExhausted {
        kind,
        attempts: budget,
    })
}
