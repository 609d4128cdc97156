use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    /// Unit offset of one grid step in this direction.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
        }
    }

}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Vec2 {
    pub x: i32,
    pub y: i32,
}

/// Shared shape of everything that moves on the grid: player, items,
/// enemies. Position is always a walkable in-bounds cell once placed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MobileEntity {
    pub x: i32,
    pub y: i32,
    pub dir: Direction,
}

impl MobileEntity {
    pub fn new(x: i32, y: i32, dir: Direction) -> Self {
        Self { x, y, dir }
    }

    pub fn is_at(&self, x: i32, y: i32) -> bool {
        self.x == x && self.y == y
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Playing,
    Won,
    Lost,
}

/// Mutable aggregate the tick orchestrator and collision resolution write
/// into. Won and Lost are terminal until the next load.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MatchState {
    pub score: i32,
    pub countdown: i32,
    pub lives: i32,
    pub status: MatchStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PlayerView {
    pub x: i32,
    pub y: i32,
    pub dir: Direction,
    pub invulnerable: bool,
}

/// Fire-and-forget notifications for the cosmetic-effect collaborator
/// (score popups). Drained by [`crate::engine::GameEngine::snapshot`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    Pickup { amount: i32, x: i32, y: i32 },
    Damage { amount: i32, x: i32, y: i32 },
}

/// Read-only post-tick view polled by rendering/UI each frame.
#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    pub tiles: Vec<String>,
    pub player: PlayerView,
    pub items: Vec<MobileEntity>,
    pub enemies: Vec<MobileEntity>,
    pub goal: Vec2,
    #[serde(rename = "matchState")]
    pub match_state: MatchState,
    pub events: Vec<RuntimeEvent>,
}
