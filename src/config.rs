//! Match tuning. `GameConfig::default()` reproduces the classic board.

pub const MAZE_WIDTH: i32 = 20;
pub const MAZE_HEIGHT: i32 = 15;

pub const MAX_ITEMS: usize = 5;
pub const MAX_ENEMIES: usize = 3;

pub const STARTING_LIVES: i32 = 3;
pub const STARTING_COUNTDOWN: i32 = 100;

pub const ITEM_REWARD: i32 = 10;
pub const LIFE_LOSS_ON_HIT: i32 = 1;

pub const ITEM_MOVE_INTERVAL_MS: u64 = 500;
pub const ENEMY_MOVE_INTERVAL_MS: u64 = 500;
pub const COUNTDOWN_INTERVAL_MS: u64 = 1_000;
pub const INVULNERABLE_DURATION_MS: u64 = 1_000;

/// Fixed configuration surface of a match. Set once before load, never
/// mutated at runtime.
#[derive(Clone, Debug)]
pub struct GameConfig {
    pub width: i32,
    pub height: i32,
    pub max_items: usize,
    pub max_enemies: usize,
    pub starting_lives: i32,
    pub starting_countdown: i32,
    pub item_reward: i32,
    pub life_loss_on_hit: i32,
    pub item_move_interval_ms: u64,
    pub enemy_move_interval_ms: u64,
    pub countdown_interval_ms: u64,
    pub invulnerable_duration_ms: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: MAZE_WIDTH,
            height: MAZE_HEIGHT,
            max_items: MAX_ITEMS,
            max_enemies: MAX_ENEMIES,
            starting_lives: STARTING_LIVES,
            starting_countdown: STARTING_COUNTDOWN,
            item_reward: ITEM_REWARD,
            life_loss_on_hit: LIFE_LOSS_ON_HIT,
            item_move_interval_ms: ITEM_MOVE_INTERVAL_MS,
            enemy_move_interval_ms: ENEMY_MOVE_INTERVAL_MS,
            countdown_interval_ms: COUNTDOWN_INTERVAL_MS,
            invulnerable_duration_ms: INVULNERABLE_DURATION_MS,
        }
    }
}
