//! Static cell classification built once per load from a layout. Rows are
//! byte strings: `#` wall, `.` path, plus one-shot spawn codes (`o` item,
//! `P` player, `G` goal, `E` enemy) that collapse to path cells and are
//! reported through [`Placements`].

use serde::Serialize;

use crate::config::GameConfig;
use crate::error::GameError;
use crate::types::Vec2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cell {
    Wall,
    Walkable,
}

/// Spawn instructions extracted from a layout, consumed exactly once while
/// building the board. Not retained as cell state.
#[derive(Clone, Debug)]
pub struct Placements {
    pub player: Vec2,
    pub goal: Vec2,
    pub items: Vec<Vec2>,
    pub enemies: Vec<Vec2>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    width: i32,
    height: i32,
    cells: Vec<Cell>,
}

impl Grid {
    /// Parses and validates a layout against the configured dimensions.
    /// Fails without side effects; callers commit the result only on `Ok`.
    pub fn from_layout(
        rows: &[String],
        config: &GameConfig,
    ) -> Result<(Self, Placements), GameError> {
        if rows.len() != config.height as usize {
            return Err(GameError::InvalidLayout(format!(
                "expected {} rows, found {}",
                config.height,
                rows.len()
            )));
        }

        let mut cells = Vec::with_capacity((config.width * config.height) as usize);
        let mut player = None;
        let mut goal = None;
        let mut items = Vec::new();
        let mut enemies = Vec::new();

        for (y, row) in rows.iter().enumerate() {
            if row.len() != config.width as usize {
                return Err(GameError::InvalidLayout(format!(
                    "row {} has {} columns, expected {}",
                    y,
                    row.len(),
                    config.width
                )));
            }
            for (x, code) in row.bytes().enumerate() {
                let pos = Vec2 {
                    x: x as i32,
                    y: y as i32,
                };
                match code {
                    b'#' => cells.push(Cell::Wall),
                    b'.' => cells.push(Cell::Walkable),
                    b'o' => {
                        cells.push(Cell::Walkable);
                        items.push(pos);
                    }
                    b'E' => {
                        cells.push(Cell::Walkable);
                        enemies.push(pos);
                    }
                    // Last spawn code scanned wins if duplicated.
                    b'P' => {
                        cells.push(Cell::Walkable);
                        player = Some(pos);
                    }
                    b'G' => {
                        cells.push(Cell::Walkable);
                        goal = Some(pos);
                    }
                    other => {
                        return Err(GameError::InvalidLayout(format!(
                            "unknown code '{}' at ({}, {})",
                            other as char, x, y
                        )));
                    }
                }
            }
        }

        let player = player
            .ok_or_else(|| GameError::InvalidLayout("no player spawn 'P'".to_string()))?;
        let goal =
            goal.ok_or_else(|| GameError::InvalidLayout("no goal spawn 'G'".to_string()))?;

        let grid = Self {
            width: config.width,
            height: config.height,
            cells,
        };
        tracing::debug!(
            width = grid.width,
            height = grid.height,
            items = items.len(),
            enemies = enemies.len(),
            "layout parsed"
        );
        Ok((
            grid,
            Placements {
                player,
                goal,
                items,
                enemies,
            },
        ))
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// False for any out-of-bounds coordinate or wall cell. Pure.
    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return false;
        }
        self.cells[(y * self.width + x) as usize] == Cell::Walkable
    }

    /// Row strings (`#`/`.`) for the rendering collaborator.
    pub fn rows(&self) -> Vec<String> {
        (0..self.height)
            .map(|y| {
                (0..self.width)
                    .map(|x| if self.is_walkable(x, y) { '.' } else { '#' })
                    .collect()
            })
            .collect()
    }
}

/// The classic 20x15 teaching board: seven item tiles (the default cap keeps
/// the first five), player at (1, 1), goal at (18, 13). Enemies come
/// entirely from fill-to-quota.
pub fn default_layout() -> Vec<String> {
    [
        "####################",
        "#P...#.....#...o#..#",
        "#.##.#.###.#.##.##.#",
        "#.#o....#.....#....#",
        "#.####.##.###.####.#",
        "#....#....#......#.#",
        "#.##.####.#.####.#.#",
        "#.#o...o#....o.#...#",
        "#.####.#####.#.###.#",
        "#....#.....#.....#.#",
        "####.#.###.#####.#.#",
        "#o......#......#...#",
        "#######.######.###.#",
        "#.....#....o......G#",
        "####################",
    ]
    .iter()
    .map(|row| row.to_string())
    .collect()
}
